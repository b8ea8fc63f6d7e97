//! Best-effort delivery of markdown messages to a group-robot webhook.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives formatted change messages.
///
/// Delivery is best-effort: implementations log their own failures and never
/// return them, so a notification problem cannot interrupt a scan.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, markdown: &str);
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _markdown: &str) {}
}

#[derive(Serialize)]
struct MarkdownBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    msgtype: &'static str,
    markdown: MarkdownBody<'a>,
}

/// Reply envelope; robots answer 200 with a non-zero `errcode` on rejection.
#[derive(Deserialize)]
struct WebhookReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Posts `{"msgtype": "markdown", "markdown": {"content": …}}` to a webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// Delivers one message and reports the outcome.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::Http`] on network failure.
    /// - [`NotifyError::UnexpectedStatus`] on a non-2xx response.
    /// - [`NotifyError::Rejected`] when a 2xx reply carries a non-zero `errcode`.
    pub async fn post(&self, markdown: &str) -> Result<(), NotifyError> {
        let message = WebhookMessage {
            msgtype: "markdown",
            markdown: MarkdownBody { content: markdown },
        };
        let response = self.client.post(&self.url).json(&message).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        // Non-JSON 2xx bodies count as accepted.
        if let Ok(reply) = serde_json::from_str::<WebhookReply>(&body) {
            if reply.errcode != 0 {
                return Err(NotifyError::Rejected {
                    code: reply.errcode,
                    message: reply.errmsg,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, markdown: &str) {
        if let Err(e) = self.post(markdown).await {
            tracing::warn!(error = %e, "notification delivery failed");
        }
    }
}

/// Picks the webhook notifier when a URL is configured, the disabled one
/// otherwise. A webhook client that cannot be built also disables delivery.
#[must_use]
pub fn notifier_from_config(webhook_url: Option<&str>) -> Arc<dyn Notifier> {
    let Some(url) = webhook_url.filter(|u| !u.trim().is_empty()) else {
        tracing::debug!("no webhook configured; notifications disabled");
        return Arc::new(DisabledNotifier);
    };
    match WebhookNotifier::new(url) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build webhook client; notifications disabled");
            Arc::new(DisabledNotifier)
        }
    }
}
