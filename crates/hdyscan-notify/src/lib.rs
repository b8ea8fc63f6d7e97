pub mod client;
pub mod error;
pub mod format;

pub use client::{notifier_from_config, DisabledNotifier, Notifier, WebhookNotifier};
pub use error::NotifyError;
pub use format::format_delta;
