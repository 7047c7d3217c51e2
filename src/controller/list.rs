use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use crate::api::PriceSource;
use crate::config::{CHANNEL_CAPACITY, LIST_REFRESH_INTERVAL_SECS, SEARCH_DEBOUNCE_MS};
use crate::error::Result;
use crate::types::{Item, Paginated};

/// Messages from the controller's own timers and fetch tasks.
#[derive(Debug)]
pub enum ListMsg {
    /// The search debounce elapsed without another keystroke.
    SearchDue,
    /// Periodic refresh tick.
    RefreshDue,
    Loaded {
        seq: u64,
        silent: bool,
        result: Result<Paginated<Item>>,
    },
}

/// Query, page and last successful response of the item list.
///
/// Every fetch is tagged with a monotonically increasing sequence number and
/// only the response to the most recently issued request is applied, so a
/// slow page 2 can never overwrite a fast page 3. Timers and fetches are
/// spawned tasks owned by the controller and aborted on [`shutdown`] or drop.
///
/// [`shutdown`]: ListController::shutdown
pub struct ListController<A> {
    api: Arc<A>,
    query: String,
    page: u32,
    limit: u32,
    response: Option<Paginated<Item>>,
    loading: bool,
    error: Option<String>,
    /// Sequence number of the most recently issued fetch.
    latest_seq: u64,
    debounce: Option<JoinHandle<()>>,
    refresh: Option<JoinHandle<()>>,
    in_flight: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<ListMsg>,
    rx: mpsc::Receiver<ListMsg>,
}

impl<A: PriceSource> ListController<A> {
    pub fn new(api: Arc<A>, limit: u32) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            api,
            query: String::new(),
            page: 1,
            limit,
            response: None,
            loading: false,
            error: None,
            latest_seq: 0,
            debounce: None,
            refresh: None,
            in_flight: Vec::new(),
            tx,
            rx,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn response(&self) -> Option<&Paginated<Item>> {
        self.response.as_ref()
    }

    pub fn items(&self) -> &[Item] {
        self.response.as_ref().map_or(&[], |r| r.data.as_slice())
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_pending(&self) -> bool {
        self.debounce.is_some()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Search box edit. (Re)starts the debounce timer; the fetch happens when
    /// it elapses, using whatever the query is at that point.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        if let Some(pending) = self.debounce.take() {
            pending.abort();
        }
        let tx = self.tx.clone();
        self.debounce = Some(tokio::spawn(async move {
            sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS)).await;
            let _ = tx.send(ListMsg::SearchDue).await;
        }));
    }

    /// Explicit search: skips the debounce, back to page 1.
    pub fn submit(&mut self) {
        if let Some(pending) = self.debounce.take() {
            pending.abort();
        }
        self.page = 1;
        self.fetch(false);
    }

    /// Requests `page` for the current query. Only the lower bound is checked;
    /// the server clamps anything past the last page.
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
        self.fetch(false);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page.saturating_add(1));
    }

    pub fn prev_page(&mut self) {
        if self.page > 1 {
            self.set_page(self.page - 1);
        }
    }

    /// User-initiated re-fetch of the current query and page.
    pub fn refresh(&mut self) {
        self.fetch(false);
    }

    /// Starts the periodic silent refresh. Replaces any running timer.
    pub fn start_auto_refresh(&mut self) {
        if let Some(running) = self.refresh.take() {
            running.abort();
        }
        let tx = self.tx.clone();
        self.refresh = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(LIST_REFRESH_INTERVAL_SECS));
            ticker.tick().await; // skip immediate first tick, the view just loaded

            loop {
                ticker.tick().await;
                if tx.send(ListMsg::RefreshDue).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn fetch(&mut self, silent: bool) {
        self.latest_seq += 1;
        let seq = self.latest_seq;
        if !silent {
            self.loading = true;
        }

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let query = Some(self.query.clone()).filter(|q| !q.trim().is_empty());
        let (page, limit) = (self.page, self.limit);
        debug!(seq, page, limit, query = ?query, silent, "Fetching item list");

        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(tokio::spawn(async move {
            let result = api.list_items(query.as_deref(), page, limit).await;
            let _ = tx.send(ListMsg::Loaded { seq, silent, result }).await;
        }));
    }

    /// Applies everything the controller's tasks have reported since the last
    /// call. Returns true if anything was processed.
    pub fn process_pending(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg);
            changed = true;
        }
        changed
    }

    fn handle(&mut self, msg: ListMsg) {
        match msg {
            ListMsg::SearchDue => {
                self.debounce = None;
                self.page = 1;
                self.fetch(false);
            }
            ListMsg::RefreshDue => {
                if self.loading {
                    debug!(page = self.page, "Skipping periodic refresh, user fetch in flight");
                    return;
                }
                debug!(page = self.page, "Periodic list refresh");
                self.fetch(true);
            }
            ListMsg::Loaded { seq, silent, result } => {
                if seq != self.latest_seq {
                    debug!(seq, latest = self.latest_seq, "Discarding stale list response");
                    return;
                }
                self.loading = false;
                match result {
                    Ok(response) => {
                        info!(
                            page = response.page,
                            total_pages = response.total_pages,
                            total = response.total,
                            rows = response.data.len(),
                            "Item list loaded"
                        );
                        self.page = response.page.max(1);
                        self.response = Some(response);
                        self.error = None;
                    }
                    Err(e) if silent => {
                        warn!("Background refresh failed, keeping current page: {e}");
                    }
                    Err(e) => {
                        warn!("Failed to fetch items: {e}");
                        self.error = Some(e.to_string());
                        // Back to the page actually on screen.
                        self.page = self.response.as_ref().map_or(1, |r| r.page.max(1));
                    }
                }
            }
        }
    }

    /// Stops timers and in-flight fetches. Late results are never applied.
    pub fn shutdown(&mut self) {
        for handle in self
            .debounce
            .take()
            .into_iter()
            .chain(self.refresh.take())
            .chain(self.in_flight.drain(..))
        {
            handle.abort();
        }
        self.loading = false;
        while self.rx.try_recv().is_ok() {}
    }
}

impl<A> Drop for ListController<A> {
    fn drop(&mut self) {
        let handles = self
            .debounce
            .iter()
            .chain(self.refresh.iter())
            .chain(self.in_flight.iter());
        for handle in handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, FakeApi};

    async fn settle<A: PriceSource>(ctrl: &mut ListController<A>) {
        for _ in 0..5 {
            sleep(Duration::from_millis(10)).await;
            ctrl.process_pending();
        }
    }

    fn list_call(query: Option<&str>, page: u32) -> Call {
        Call::List { query: query.map(str::to_string), page, limit: 20 }
    }

    #[tokio::test(start_paused = true)]
    async fn submit_loads_first_page() {
        let api = Arc::new(FakeApi::with_items(1..=45));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.submit();
        assert!(ctrl.is_loading());
        settle(&mut ctrl).await;

        assert!(!ctrl.is_loading());
        let response = ctrl.response().unwrap();
        assert_eq!(response.total_pages, 3);
        assert_eq!(ctrl.items().len(), 20);
        assert_eq!(api.list_calls(), vec![list_call(None, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_collapses_keystrokes_into_one_fetch() {
        let api = Arc::new(FakeApi::with_items(1..=45));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_query("I");
        sleep(Duration::from_millis(100)).await;
        ctrl.set_query("It");
        sleep(Duration::from_millis(100)).await;
        ctrl.set_query("Item 4");
        assert!(ctrl.search_pending());
        ctrl.process_pending();
        assert!(api.list_calls().is_empty());

        sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS + 10)).await;
        settle(&mut ctrl).await;

        assert_eq!(api.list_calls(), vec![list_call(Some("Item 4"), 1)]);
        assert!(!ctrl.search_pending());
        // "Item 4" plus "Item 40".."Item 45"
        assert_eq!(ctrl.response().unwrap().total, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_search_resets_page() {
        let api = Arc::new(FakeApi::with_items(1..=45));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_page(3);
        settle(&mut ctrl).await;
        assert_eq!(ctrl.page(), 3);

        ctrl.set_query("Item 1");
        sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS + 10)).await;
        settle(&mut ctrl).await;

        assert_eq!(ctrl.page(), 1);
        assert_eq!(api.list_calls().last(), Some(&list_call(Some("Item 1"), 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_cancels_pending_debounce() {
        let api = Arc::new(FakeApi::with_items(1..=5));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_query("Item 2");
        ctrl.submit();
        sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS * 2)).await;
        settle(&mut ctrl).await;

        assert_eq!(api.list_calls(), vec![list_call(Some("Item 2"), 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn page_past_the_end_is_requested_as_is() {
        let api = Arc::new(FakeApi::with_items(1..=45));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_page(4);
        settle(&mut ctrl).await;

        assert_eq!(api.list_calls(), vec![list_call(None, 4)]);
        assert!(ctrl.items().is_empty());
        assert_eq!(ctrl.response().unwrap().total_pages, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn prev_page_stops_at_one() {
        let api = Arc::new(FakeApi::with_items(1..=5));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.prev_page();
        ctrl.set_page(0);
        settle(&mut ctrl).await;

        assert_eq!(api.list_calls(), vec![list_call(None, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_is_discarded() {
        let api = Arc::new(
            FakeApi::with_items(1..=60)
                .list_delays([Duration::from_millis(500), Duration::from_millis(10)]),
        );
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_page(2);
        ctrl.set_page(3);
        settle(&mut ctrl).await;
        assert_eq!(ctrl.response().unwrap().page, 3);
        assert!(!ctrl.is_loading());

        sleep(Duration::from_millis(600)).await;
        settle(&mut ctrl).await;
        assert_eq!(ctrl.response().unwrap().page, 3);
        assert_eq!(ctrl.page(), 3);
        assert_eq!(ctrl.items()[0].item_id.0, 41);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sets_error_and_stops_loading() {
        let api = Arc::new(FakeApi::with_items(1..=5).failing_list());
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.submit();
        settle(&mut ctrl).await;

        assert!(!ctrl.is_loading());
        assert_eq!(ctrl.error(), Some("API error 503: maintenance"));
        // No automatic retry.
        sleep(Duration::from_secs(10)).await;
        assert_eq!(api.list_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_change_keeps_displayed_page() {
        let api = Arc::new(FakeApi::with_items(1..=60));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.submit();
        settle(&mut ctrl).await;

        api.set_list_failing(true);
        ctrl.next_page();
        settle(&mut ctrl).await;
        assert_eq!(ctrl.error(), Some("API error 503: maintenance"));
        assert_eq!(ctrl.page(), 1);
        assert_eq!(ctrl.response().unwrap().page, 1);

        api.set_list_failing(false);
        ctrl.next_page();
        settle(&mut ctrl).await;

        assert_eq!(
            api.list_calls(),
            vec![list_call(None, 1), list_call(None, 2), list_call(None, 2)]
        );
        assert_eq!(ctrl.response().unwrap().page, 2);
        assert_eq!(ctrl.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_refresh_waits_for_user_fetch() {
        let api = Arc::new(
            FakeApi::with_items(1..=60)
                .list_delays([Duration::ZERO, Duration::from_millis(200)]),
        );
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.submit();
        settle(&mut ctrl).await;

        ctrl.next_page();
        ctrl.handle(ListMsg::RefreshDue);
        assert!(ctrl.is_loading());

        sleep(Duration::from_millis(250)).await;
        settle(&mut ctrl).await;

        assert_eq!(api.list_calls(), vec![list_call(None, 1), list_call(None, 2)]);
        assert_eq!(ctrl.response().unwrap().page, 2);
        assert_eq!(ctrl.items()[0].item_id.0, 21);
        assert!(!ctrl.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_silent_refresh_leaves_page_untouched() {
        let api = Arc::new(FakeApi::with_items(1..=45));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_page(2);
        settle(&mut ctrl).await;
        ctrl.start_auto_refresh();
        let before = ctrl.response().cloned();
        assert!(before.is_some());

        api.set_list_failing(true);
        sleep(Duration::from_secs(LIST_REFRESH_INTERVAL_SECS)).await;
        for _ in 0..5 {
            sleep(Duration::from_millis(10)).await;
            ctrl.process_pending();
            assert!(!ctrl.is_loading());
        }

        assert_eq!(api.list_calls(), vec![list_call(None, 2), list_call(None, 2)]);
        assert_eq!(ctrl.response().cloned(), before);
        assert_eq!(ctrl.error(), None);
        assert_eq!(ctrl.page(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_refetches_current_page_until_shutdown() {
        let api = Arc::new(FakeApi::with_items(1..=45));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.set_page(2);
        ctrl.start_auto_refresh();
        settle(&mut ctrl).await;
        assert_eq!(api.list_calls().len(), 1);

        sleep(Duration::from_secs(LIST_REFRESH_INTERVAL_SECS - 5)).await;
        settle(&mut ctrl).await;
        assert_eq!(api.list_calls().len(), 1);

        sleep(Duration::from_secs(10)).await;
        settle(&mut ctrl).await;
        assert_eq!(api.list_calls(), vec![list_call(None, 2), list_call(None, 2)]);
        assert!(!ctrl.is_loading());

        ctrl.shutdown();
        sleep(Duration::from_secs(LIST_REFRESH_INTERVAL_SECS * 3)).await;
        ctrl.process_pending();
        assert_eq!(api.list_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_in_flight_result() {
        let api = Arc::new(FakeApi::with_items(1..=5).list_delays([Duration::from_millis(100)]));
        let mut ctrl = ListController::new(Arc::clone(&api), 20);

        ctrl.submit();
        sleep(Duration::from_millis(10)).await;
        ctrl.shutdown();
        sleep(Duration::from_millis(200)).await;

        assert!(!ctrl.process_pending());
        assert!(ctrl.response().is_none());
    }
}
