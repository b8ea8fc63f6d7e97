use crate::app_config::AppConfig;
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const DEFAULT_PRODUCT_URL_TEMPLATE: &str =
    "https://www.szhdy.com/cart?action=configureproduct&pid={pid}";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = or_default(
        "HDYSCAN_DATABASE_URL",
        "sqlite://data/hdyscan.sqlite?mode=rwc",
    );
    let export_path = PathBuf::from(or_default(
        "HDYSCAN_EXPORT_PATH",
        "data/hudiyun_results.json",
    ));
    let legacy_path = PathBuf::from(or_default("HDYSCAN_LEGACY_PATH", "hudiyun_results.json"));

    let product_url_template =
        or_default("HDYSCAN_PRODUCT_URL_TEMPLATE", DEFAULT_PRODUCT_URL_TEMPLATE);
    if !product_url_template.contains("{pid}") {
        return Err(invalid(
            "HDYSCAN_PRODUCT_URL_TEMPLATE",
            "template must contain a {pid} placeholder".to_string(),
        ));
    }

    let log_level = or_default("HDYSCAN_LOG_LEVEL", "info");
    let webhook_url = lookup("HDYSCAN_WEBHOOK_URL")
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    let workers = parse_usize("HDYSCAN_WORKERS", "5")?;
    if workers == 0 {
        return Err(invalid("HDYSCAN_WORKERS", "must be at least 1".to_string()));
    }
    let failure_threshold = parse_u32("HDYSCAN_FAILURE_THRESHOLD", "50")?;
    let high_price_threshold = parse_u64("HDYSCAN_HIGH_PRICE_THRESHOLD", "9999")?;
    let page_timeout_secs = parse_u64("HDYSCAN_PAGE_TIMEOUT_SECS", "10")?;
    let settle_timeout_ms = parse_u64("HDYSCAN_SETTLE_TIMEOUT_MS", "3000")?;
    let inter_request_delay_ms = parse_u64("HDYSCAN_INTER_REQUEST_DELAY_MS", "250")?;
    let user_agent = or_default("HDYSCAN_USER_AGENT", DEFAULT_USER_AGENT);

    let db_max_connections = parse_u32("HDYSCAN_DB_MAX_CONNECTIONS", "5")?;
    let db_acquire_timeout_secs = parse_u64("HDYSCAN_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        export_path,
        legacy_path,
        product_url_template,
        log_level,
        webhook_url,
        workers,
        failure_threshold,
        high_price_threshold,
        page_timeout_secs,
        settle_timeout_ms,
        inter_request_delay_ms,
        user_agent,
        db_max_connections,
        db_acquire_timeout_secs,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
