use thiserror::Error;

/// Errors raised while delivering a notification.
///
/// Never propagated into a scan; [`crate::Notifier`] implementations log and
/// drop them.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook answered with a non-2xx status.
    #[error("webhook returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The webhook answered 2xx but reported a non-zero `errcode`.
    #[error("webhook rejected message (errcode {code}): {message}")]
    Rejected { code: i64, message: String },
}
