pub mod app_config;
pub mod config;
pub mod delta;
pub mod products;
pub mod snapshot;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use delta::{diff, Delta, DeltaKind};
pub use products::{BillingCycle, ExtractedFields, Pid, ProductRecord};
pub use snapshot::{PageSnapshot, Verdict};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
