pub mod client;

use std::future::Future;

use crate::error::Result;
use crate::types::{Item, Paginated, PriceHistoryEntry};

pub use client::ApiClient;

/// Read access to the price API. Controllers are generic over this so they can
/// be driven by [`ApiClient`] in the binary and by a fake in tests.
pub trait PriceSource: Send + Sync + 'static {
    /// `GET /items?q=&page=&limit=`. `query` is omitted from the request when
    /// empty or whitespace.
    fn list_items(
        &self,
        query: Option<&str>,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Paginated<Item>>> + Send;

    /// `GET /items/{id}`.
    fn get_item(&self, id: &str) -> impl Future<Output = Result<Item>> + Send;

    /// `GET /items/{id}/history[?days=N]`; `None` asks for the server default.
    fn get_history(
        &self,
        id: &str,
        days: Option<u32>,
    ) -> impl Future<Output = Result<Vec<PriceHistoryEntry>>> + Send;
}
