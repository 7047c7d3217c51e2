use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::PriceSource;
use crate::config::{CHANNEL_CAPACITY, HISTORY_WINDOW_DAYS};
use crate::error::Result;
use crate::types::{ItemId, PriceHistoryEntry};

/// Result of a history fetch, routed back to the owning [`ChartState`].
#[derive(Debug)]
pub struct HistoryLoaded {
    pub item_id: ItemId,
    pub result: Result<Vec<PriceHistoryEntry>>,
}

/// What an expanded row's chart area should show.
#[derive(Debug, PartialEq)]
pub enum ChartView<'a> {
    Loading,
    /// Possibly empty: a failed fetch leaves no cached history.
    Ready(&'a [PriceHistoryEntry]),
}

/// Inline chart expansion for list rows, with a lazily filled history cache.
///
/// Expanding a row whose history is neither cached nor in flight starts a
/// `get_history(id, 7)` fetch. Collapsing never fetches and never evicts, so
/// re-expanding a cached row is instant.
pub struct ChartState<A> {
    api: Arc<A>,
    expanded: HashSet<ItemId>,
    loading: HashSet<ItemId>,
    cache: HashMap<ItemId, Vec<PriceHistoryEntry>>,
    tasks: HashMap<ItemId, JoinHandle<()>>,
    tx: mpsc::Sender<HistoryLoaded>,
    rx: mpsc::Receiver<HistoryLoaded>,
}

impl<A: PriceSource> ChartState<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            api,
            expanded: HashSet::new(),
            loading: HashSet::new(),
            cache: HashMap::new(),
            tasks: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Flips the chart for `id`. Returns whether it is expanded afterwards.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        if self.expanded.remove(&id) {
            return false;
        }
        self.expanded.insert(id);
        if !self.cache.contains_key(&id) && !self.loading.contains(&id) {
            self.fetch(id);
        }
        true
    }

    fn fetch(&mut self, id: ItemId) {
        self.loading.insert(id);
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        debug!(item_id = %id, "Fetching chart history");
        let handle = tokio::spawn(async move {
            let result = api
                .get_history(&id.to_string(), Some(HISTORY_WINDOW_DAYS))
                .await;
            let _ = tx.send(HistoryLoaded { item_id: id, result }).await;
        });
        self.tasks.insert(id, handle);
    }

    /// Applies finished fetches. Returns true if anything changed.
    pub fn process_pending(&mut self) -> bool {
        let mut changed = false;
        while let Ok(loaded) = self.rx.try_recv() {
            self.apply(loaded);
            changed = true;
        }
        changed
    }

    fn apply(&mut self, loaded: HistoryLoaded) {
        let HistoryLoaded { item_id, result } = loaded;
        self.loading.remove(&item_id);
        self.tasks.remove(&item_id);
        match result {
            Ok(entries) => {
                debug!(item_id = %item_id, points = entries.len(), "Chart history cached");
                self.cache.insert(item_id, entries);
            }
            Err(e) => warn!(item_id = %item_id, "Failed to load chart data: {e}"),
        }
    }

    pub fn is_expanded(&self, id: ItemId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn is_loading(&self, id: ItemId) -> bool {
        self.loading.contains(&id)
    }

    pub fn history(&self, id: ItemId) -> Option<&[PriceHistoryEntry]> {
        self.cache.get(&id).map(Vec::as_slice)
    }

    /// `None` while the row is collapsed.
    pub fn view(&self, id: ItemId) -> Option<ChartView<'_>> {
        if !self.is_expanded(id) {
            return None;
        }
        if self.is_loading(id) {
            return Some(ChartView::Loading);
        }
        Some(ChartView::Ready(self.history(id).unwrap_or(&[])))
    }

    pub fn shutdown(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
        self.loading.clear();
        while self.rx.try_recv().is_ok() {}
    }
}

impl<A> Drop for ChartState<A> {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}
