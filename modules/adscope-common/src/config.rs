use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Browser automation (Browserless service). Empty = browser scrapers disabled.
    pub browserless_url: String,
    pub browserless_token: String,

    // API-based upstreams. Empty = that upstream disabled.
    pub serpapi_key: String,
    pub meta_access_token: String,
    pub tiktok_api_key: String,

    // Transparency-center region filter (two-letter code).
    pub region: String,

    // Scheduler
    pub batch_incremental_hours: u32,
    pub batch_full_day: String,
    pub batch_full_hour: u32,

    // Max targets scraped concurrently within one run.
    pub batch_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            browserless_url: env::var("BROWSERLESS_URL").unwrap_or_default(),
            browserless_token: env::var("BROWSERLESS_TOKEN").unwrap_or_default(),
            serpapi_key: env::var("SERPAPI_KEY").unwrap_or_default(),
            meta_access_token: env::var("META_ACCESS_TOKEN").unwrap_or_default(),
            tiktok_api_key: env::var("TIKTOK_API_KEY").unwrap_or_default(),
            region: env::var("REGION").unwrap_or_else(|_| "KR".to_string()),
            batch_incremental_hours: env::var("BATCH_INCREMENTAL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            batch_full_day: env::var("BATCH_FULL_DAY").unwrap_or_else(|_| "sun".to_string()),
            batch_full_hour: env::var("BATCH_FULL_HOUR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            batch_concurrency: env::var("BATCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }

    /// Log the presence of each sensitive env var without exposing its value.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("BROWSERLESS_URL", &self.browserless_url),
            ("BROWSERLESS_TOKEN", &self.browserless_token),
            ("SERPAPI_KEY", &self.serpapi_key),
            ("META_ACCESS_TOKEN", &self.meta_access_token),
            ("TIKTOK_API_KEY", &self.tiktok_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
