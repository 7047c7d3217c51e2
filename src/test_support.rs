//! In-process price API double shared by controller and app tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::PriceSource;
use crate::error::{AppError, Result};
use crate::storage::KeyValueStore;
use crate::types::{Item, ItemId, Paginated, PriceHistoryEntry, Trend};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    List { query: Option<String>, page: u32, limit: u32 },
    Item(String),
    History(String, Option<u32>),
}

pub(crate) fn item(id: i64) -> Item {
    Item {
        item_id: ItemId(id),
        name: format!("Item {id}"),
        price: id * 100,
        high: id * 110,
        low: id * 90,
        volume: 1_000,
        avg_24h: id * 100,
        avg_7d: id * 100,
        trend: Trend::Flat,
        updated_at: "2024-03-01T12:00:00Z".to_string(),
    }
}

#[derive(Default)]
pub(crate) struct FakeApi {
    items: Vec<Item>,
    calls: Mutex<Vec<Call>>,
    list_delays: Mutex<VecDeque<Duration>>,
    history_delay: Duration,
    fail_history: bool,
    fail_list: AtomicBool,
}

impl FakeApi {
    pub(crate) fn with_items(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            items: ids.into_iter().map(item).collect(),
            ..Self::default()
        }
    }

    /// Delays applied to successive `list_items` calls, in call order.
    pub(crate) fn list_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        *self.list_delays.lock().unwrap() = delays.into_iter().collect();
        self
    }

    pub(crate) fn history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = delay;
        self
    }

    pub(crate) fn failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    pub(crate) fn failing_list(self) -> Self {
        self.set_list_failing(true);
        self
    }

    /// Switches `list_items` failures on or off for subsequent calls.
    pub(crate) fn set_list_failing(&self, failing: bool) {
        self.fail_list.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn list_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::List { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PriceSource for FakeApi {
    async fn list_items(
        &self,
        query: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<Item>> {
        self.record(Call::List { query: query.map(str::to_string), page, limit });
        let delay = self.list_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(AppError::Status { status: 503, message: "maintenance".into() });
        }

        let needle = query.unwrap_or("").to_lowercase();
        let matching: Vec<Item> = self
            .items
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        let start = (page.saturating_sub(1) * limit) as usize;
        let data = matching.iter().skip(start).take(limit as usize).cloned().collect();
        Ok(Paginated::new(data, matching.len() as u64, page, limit))
    }

    async fn get_item(&self, id: &str) -> Result<Item> {
        self.record(Call::Item(id.to_string()));
        self.items
            .iter()
            .find(|i| i.item_id.to_string() == id)
            .cloned()
            .ok_or_else(|| AppError::Status { status: 404, message: "Item not found".into() })
    }

    async fn get_history(&self, id: &str, days: Option<u32>) -> Result<Vec<PriceHistoryEntry>> {
        self.record(Call::History(id.to_string(), days));
        if !self.history_delay.is_zero() {
            tokio::time::sleep(self.history_delay).await;
        }
        if self.fail_history {
            return Err(AppError::Status { status: 500, message: "history unavailable".into() });
        }
        Ok(vec![
            PriceHistoryEntry { date: "2024-02-28T00:00:00Z".into(), price: 100 },
            PriceHistoryEntry { date: "2024-02-29T00:00:00Z".into(), price: 110 },
        ])
    }
}

/// Storage whose writes always fail; reads see an empty store.
#[derive(Default)]
pub(crate) struct FailingStore;

impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(AppError::Io(std::io::Error::other("disk full")))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(AppError::Io(std::io::Error::other("disk full")))
    }
}
