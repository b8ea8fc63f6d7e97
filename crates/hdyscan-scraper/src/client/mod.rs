//! Plain-HTTP renderer for server-rendered catalog pages.

mod query;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::ScraperError;
use crate::render::{Element, Page, Renderer};

/// [`Renderer`] that fetches pages with `reqwest` and answers DOM queries
/// with CSS selectors over the returned HTML.
///
/// Suitable for catalogs that render product markup server-side. Clicks are
/// replayed as navigations: clicking a form input re-requests the page with
/// the input's `name=value` pair, clicking a link follows its `href`. Waits
/// return immediately because the document is complete once fetched.
///
/// A `404` response is returned as a page (the body is the catalog's
/// not-found page); other non-2xx statuses are fetch faults.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Page>, ScraperError> {
        let url = Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        let html = fetch_html(&self.client, &url, timeout).await?;
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            url,
            html,
            timeout,
        }))
    }
}

async fn fetch_html(client: &Client, url: &Url, timeout: Duration) -> Result<String, ScraperError> {
    let timed_out = |e: reqwest::Error| {
        if e.is_timeout() {
            ScraperError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis(),
            }
        } else {
            ScraperError::Http(e)
        }
    };

    let response = client
        .get(url.clone())
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
        )
        .header(reqwest::header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
        .timeout(timeout)
        .send()
        .await
        .map_err(timed_out)?;

    let status = response.status();
    if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
        return Err(ScraperError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    response.text().await.map_err(timed_out)
}

/// One fetched document. Owned by a single work unit.
pub struct HttpPage {
    client: Client,
    url: Url,
    html: String,
    timeout: Duration,
}

#[async_trait]
impl Page for HttpPage {
    async fn wait_for_any_of(&self, selectors: &[&str], _timeout: Duration) -> bool {
        query::matches_any(&self.html, selectors)
    }

    fn title(&self) -> String {
        query::first_text(&self.html, "title").unwrap_or_default()
    }

    fn body_text(&self) -> String {
        query::first_text(&self.html, "body").unwrap_or_default()
    }

    fn query_one(&self, selector: &str) -> Option<Element> {
        query::first_text(&self.html, selector).map(Element::new)
    }

    fn query_all(&self, selector: &str) -> Vec<Element> {
        query::select_texts(&self.html, selector)
            .into_iter()
            .map(Element::new)
            .collect()
    }

    async fn trigger_click(&mut self, selector: &str) -> Result<(), ScraperError> {
        let target = query::click_target(&self.html, selector)?;
        let next = query::apply_click(&self.url, target)?;
        tracing::debug!(from = %self.url, to = %next, selector, "replaying click as navigation");
        let html = fetch_html(&self.client, &next, self.timeout).await?;
        self.url = next;
        self.html = html;
        Ok(())
    }

    async fn wait_network_idle(&self, _timeout: Duration) {}

    async fn close(&mut self) {
        self.html.clear();
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
