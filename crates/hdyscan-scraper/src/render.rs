//! The rendering seam: something that loads a catalog URL and answers DOM
//! queries against the loaded document.
//!
//! The scan pipeline only talks to these traits, so a headless browser, the
//! plain-HTTP [`crate::HttpRenderer`], or a test double can sit behind them.
//! Each [`Renderer::open`] call yields an independent [`Page`]; pages are never
//! shared between work units.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;

/// Text content of one matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    text: String,
}

impl Element {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Loads `url` and returns a page ready for queries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Timeout`] when loading exceeds `timeout`, or
    /// another fetch fault when the page cannot be loaded.
    async fn open(&self, url: &str, timeout: Duration) -> Result<Box<dyn Page>, ScraperError>;
}

#[async_trait]
pub trait Page: Send + Sync {
    /// Waits until any of `selectors` matches, up to `timeout`.
    /// Returns whether a match was seen.
    async fn wait_for_any_of(&self, selectors: &[&str], timeout: Duration) -> bool;

    fn title(&self) -> String;

    fn body_text(&self) -> String;

    fn query_one(&self, selector: &str) -> Option<Element>;

    fn query_all(&self, selector: &str) -> Vec<Element>;

    /// Clicks the first element matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ElementNotFound`] when nothing matches, or a
    /// fetch fault when the click triggers a load that fails.
    async fn trigger_click(&mut self, selector: &str) -> Result<(), ScraperError>;

    /// Waits for in-flight loads to settle, up to `timeout`.
    async fn wait_network_idle(&self, timeout: Duration);

    async fn close(&mut self);
}
