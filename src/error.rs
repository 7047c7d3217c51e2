use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Request could not be built or the client could not be constructed.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure: host unreachable, connection refused, timeout.
    #[error("Network error: unable to reach {url} ({source})")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// The API answered 2xx but the body did not match the expected shape.
    #[error("Malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid item ID: {0}")]
    InvalidId(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Status { status: 404, .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_only_matches_404() {
        let missing = AppError::Status { status: 404, message: "Item not found".into() };
        let bad = AppError::Status { status: 400, message: "invalid item ID format".into() };
        assert!(missing.is_not_found());
        assert!(!bad.is_not_found());
        assert_eq!(missing.to_string(), "API error 404: Item not found");
    }
}
