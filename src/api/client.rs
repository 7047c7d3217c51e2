use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::PriceSource;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{Item, Paginated, PriceHistoryEntry};

/// HTTP client for the GE price API. Cheap to share behind an `Arc`; the
/// underlying `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

/// Error body returned by the price API on 4xx/5xx.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_base_url(&cfg.api_url, Duration::from_secs(cfg.http_timeout_secs))
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("API_URL is not a valid URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!("API_URL cannot be used as a base: {base_url}")));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = request.build()?;
        let url = request.url().to_string();
        debug!(%url, "GET");

        let response = self.client.execute(request).await.map_err(|source| {
            warn!(%url, "request failed: {source}");
            AppError::Network { url: url.clone(), source }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            warn!(%url, status = status.as_u16(), "API error: {message}");
            return Err(AppError::Status { status: status.as_u16(), message });
        }

        let body = response
            .text()
            .await
            .map_err(|source| AppError::Network { url: url.clone(), source })?;

        serde_json::from_str(&body).map_err(|source| AppError::Decode { url, source })
    }
}

/// Prefer the API's `{"error": ...}` message, then the raw body, then the
/// status reason phrase.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status.canonical_reason().unwrap_or("unknown error").to_string()
}

impl PriceSource for ApiClient {
    async fn list_items(
        &self,
        query: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<Item>> {
        let mut params: Vec<(&str, String)> = Vec::with_capacity(3);
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            params.push(("q", q.to_string()));
        }
        params.push(("page", page.to_string()));
        params.push(("limit", limit.to_string()));

        let request = self.client.get(self.endpoint(&["items"])).query(&params);
        self.get_json(request).await
    }

    async fn get_item(&self, id: &str) -> Result<Item> {
        let request = self.client.get(self.endpoint(&["items", id]));
        self.get_json(request).await
    }

    async fn get_history(&self, id: &str, days: Option<u32>) -> Result<Vec<PriceHistoryEntry>> {
        let mut request = self.client.get(self.endpoint(&["items", id, "history"]));
        if let Some(days) = days.filter(|d| *d > 0) {
            request = request.query(&[("days", days)]);
        }
        self.get_json(request).await
    }
}
