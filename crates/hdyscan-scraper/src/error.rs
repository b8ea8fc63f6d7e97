use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {timeout_ms}ms loading {url}")]
    Timeout { url: String, timeout_ms: u128 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no element matches selector {selector}")]
    ElementNotFound { selector: String },

    #[error("element matched by {selector} cannot be clicked without a script engine")]
    UnsupportedInteraction { selector: String },
}

impl ScraperError {
    /// `true` for faults raised while loading a page (network, timeout, status).
    #[must_use]
    pub fn is_fetch_fault(&self) -> bool {
        matches!(
            self,
            ScraperError::Http(_)
                | ScraperError::Timeout { .. }
                | ScraperError::UnexpectedStatus { .. }
                | ScraperError::InvalidUrl { .. }
        )
    }
}
