use std::time::Duration;

/// Settings read from the environment (and `.env`, when present).
pub struct Config {
    pub adapter_timeout: Duration,
    pub resolve_timeout: Option<Duration>,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let timeout_ms: u64 = std::env::var("QUOTEHUB_ADAPTER_TIMEOUT_MS")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .unwrap_or(8000);
        let resolve_timeout = std::env::var("QUOTEHUB_RESOLVE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let log_format = std::env::var("QUOTEHUB_LOG_FORMAT").unwrap_or_else(|_| "text".into());
        Self {
            adapter_timeout: Duration::from_millis(timeout_ms),
            resolve_timeout,
            log_format,
        }
    }
}
