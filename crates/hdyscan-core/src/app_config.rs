use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub export_path: PathBuf,
    pub legacy_path: PathBuf,
    /// Product page URL with a `{pid}` placeholder.
    pub product_url_template: String,
    pub log_level: String,
    pub webhook_url: Option<String>,
    pub workers: usize,
    pub failure_threshold: u32,
    pub high_price_threshold: u64,
    pub page_timeout_secs: u64,
    pub settle_timeout_ms: u64,
    pub inter_request_delay_ms: u64,
    pub user_agent: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("export_path", &self.export_path)
            .field("legacy_path", &self.legacy_path)
            .field("product_url_template", &self.product_url_template)
            .field("log_level", &self.log_level)
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[redacted]"))
            .field("workers", &self.workers)
            .field("failure_threshold", &self.failure_threshold)
            .field("high_price_threshold", &self.high_price_threshold)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("settle_timeout_ms", &self.settle_timeout_ms)
            .field("inter_request_delay_ms", &self.inter_request_delay_ms)
            .field("user_agent", &self.user_agent)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
