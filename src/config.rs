use crate::error::{AppError, Result};

pub const API_URL: &str = "http://localhost:8080";

/// Delay between the last keystroke in the search box and the fetch it triggers.
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Silent re-fetch interval for the list view (seconds).
pub const LIST_REFRESH_INTERVAL_SECS: u64 = 300;

/// Day-window requested for inline charts and the detail page.
pub const HISTORY_WINDOW_DAYS: u32 = 7;

/// Storage key holding the JSON array of pinned item ids.
pub const PINNED_ITEMS_KEY: &str = "pinnedItems";

/// Items per page unless PAGE_LIMIT overrides it.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page size the price API accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Channel capacity for controller task results.
pub const CHANNEL_CAPACITY: usize = 1024;

/// How long the UI loop waits for a key press before redrawing (milliseconds).
pub const UI_TICK_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the price API (API_URL), without trailing slash.
    pub api_url: String,
    pub log_level: String,
    /// The TUI owns stdout, so logs go here (LOG_FILE).
    pub log_file: String,
    /// SQLite file backing pinned items (DB_PATH).
    pub db_path: String,
    /// Rows per list page (PAGE_LIMIT), 1..=100.
    pub page_limit: u32,
    /// Per-request timeout for API calls (HTTP_TIMEOUT_SECS).
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let page_limit = std::env::var("PAGE_LIMIT")
            .unwrap_or_else(|_| DEFAULT_PAGE_LIMIT.to_string())
            .parse::<u32>()
            .map_err(|_| AppError::Config("PAGE_LIMIT must be a positive integer".to_string()))?;
        if page_limit == 0 || page_limit > MAX_PAGE_LIMIT {
            return Err(AppError::Config(format!(
                "PAGE_LIMIT must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        Ok(Self {
            api_url: std::env::var("API_URL")
                .unwrap_or_else(|_| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: std::env::var("LOG_FILE").unwrap_or_else(|_| "ge-tracker.log".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "ge-tracker.db".to_string()),
            page_limit,
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("HTTP_TIMEOUT_SECS must be a number of seconds".to_string())
                })?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            log_level: "info".to_string(),
            log_file: "ge-tracker.log".to_string(),
            db_path: "ge-tracker.db".to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            http_timeout_secs: 10,
        }
    }
}
