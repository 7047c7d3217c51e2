use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::PriceSource;
use crate::config::{CHANNEL_CAPACITY, HISTORY_WINDOW_DAYS};
use crate::error::{AppError, Result};
use crate::types::{Item, PriceHistoryEntry};

/// Longest id the price API accepts.
const MAX_ITEM_ID_LEN: usize = 10;

#[derive(Debug)]
pub enum DetailMsg {
    Item { seq: u64, result: Result<Item> },
    History { seq: u64, result: Result<Vec<PriceHistoryEntry>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryState {
    Loading,
    /// Empty when the fetch failed.
    Ready(Vec<PriceHistoryEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    /// The id was missing or malformed; nothing was fetched.
    Invalid(String),
    /// The item fetch failed.
    Failed(String),
    Loaded { item: Item, history: HistoryState },
}

/// Checks that a route id is present and looks like a single path segment.
pub fn validate_item_id(raw: Option<&str>) -> Result<String> {
    let id = raw.map(str::trim).unwrap_or("");
    if id.is_empty() {
        return Err(AppError::InvalidId("item ID is required".to_string()));
    }
    if id.len() > MAX_ITEM_ID_LEN {
        return Err(AppError::InvalidId("item ID too long".to_string()));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidId("invalid item ID format".to_string()));
    }
    Ok(id.to_string())
}

/// One item plus its 7-day history.
///
/// The item and history fetches are separate failure domains: a failed
/// history fetch is logged and leaves an empty chart, never an error state.
pub struct DetailController<A> {
    api: Arc<A>,
    item_id: Option<String>,
    state: DetailState,
    seq: u64,
    tasks: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<DetailMsg>,
    rx: mpsc::Receiver<DetailMsg>,
}

impl<A: PriceSource> DetailController<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            api,
            item_id: None,
            state: DetailState::Loading,
            seq: 0,
            tasks: Vec::new(),
            tx,
            rx,
        }
    }

    /// Route entry. Anything from a previous entry is cancelled.
    pub fn enter(&mut self, raw_id: Option<&str>) {
        self.cancel_tasks();
        self.seq += 1;

        match validate_item_id(raw_id) {
            Ok(id) => {
                info!(item_id = %id, "Opening item detail");
                self.item_id = Some(id.clone());
                self.state = DetailState::Loading;
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                let seq = self.seq;
                self.tasks.push(tokio::spawn(async move {
                    let result = api.get_item(&id).await;
                    let _ = tx.send(DetailMsg::Item { seq, result }).await;
                }));
            }
            Err(e) => {
                warn!("Rejected item route {raw_id:?}: {e}");
                self.item_id = None;
                self.state = DetailState::Invalid(e.to_string());
            }
        }
    }

    fn fetch_history(&mut self, id: String) {
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let seq = self.seq;
        self.tasks.push(tokio::spawn(async move {
            let result = api.get_history(&id, Some(HISTORY_WINDOW_DAYS)).await;
            let _ = tx.send(DetailMsg::History { seq, result }).await;
        }));
    }

    pub fn process_pending(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.rx.try_recv() {
            changed |= self.handle(msg);
        }
        changed
    }

    fn handle(&mut self, msg: DetailMsg) -> bool {
        match msg {
            DetailMsg::Item { seq, .. } | DetailMsg::History { seq, .. } if seq != self.seq => false,
            DetailMsg::Item { result: Ok(item), .. } => {
                let id = item.item_id.to_string();
                self.state = DetailState::Loaded { item, history: HistoryState::Loading };
                self.fetch_history(id);
                true
            }
            DetailMsg::Item { result: Err(e), .. } => {
                warn!(item_id = ?self.item_id, "Failed to fetch item: {e}");
                self.state = DetailState::Failed(e.to_string());
                true
            }
            DetailMsg::History { result, .. } => {
                let DetailState::Loaded { history, .. } = &mut self.state else {
                    return false;
                };
                let entries = result.unwrap_or_else(|e| {
                    warn!(item_id = ?self.item_id, "Failed to fetch price history: {e}");
                    Vec::new()
                });
                *history = HistoryState::Ready(entries);
                true
            }
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn item(&self) -> Option<&Item> {
        match &self.state {
            DetailState::Loaded { item, .. } => Some(item),
            _ => None,
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    fn cancel_tasks(&mut self) {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
        while self.rx.try_recv().is_ok() {}
    }

    pub fn shutdown(&mut self) {
        self.cancel_tasks();
    }
}

impl<A> Drop for DetailController<A> {
    fn drop(&mut self) {
        for handle in &self.tasks {
            handle.abort();
        }
    }
}
