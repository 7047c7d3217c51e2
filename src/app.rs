use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{error, info};

use crate::api::PriceSource;
use crate::controller::{DetailController, ListController, Route};
use crate::state::{sort_rows, ChartState, PinnedItems};
use crate::storage::KeyValueStore;
use crate::types::{Item, ItemId};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Keystrokes edit the search query.
    Search,
}

pub struct ListView<A> {
    pub controller: ListController<A>,
    pub charts: ChartState<A>,
    /// Index into the sorted rows.
    pub selected: usize,
    pub input_mode: InputMode,
}

pub enum View<A> {
    List(ListView<A>),
    Detail(DetailController<A>),
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

/// Routing shell. Owns the process-wide pinned set and whichever view is
/// mounted; switching routes tears the old view down.
pub struct App<A, S> {
    api: Arc<A>,
    pinned: PinnedItems<S>,
    page_limit: u32,
    view: View<A>,
    /// Transient footer notice (e.g. a failed pin write).
    pub notice: Option<String>,
    pub should_quit: bool,
}

impl<A: PriceSource, S: KeyValueStore> App<A, S> {
    pub fn new(api: Arc<A>, pinned: PinnedItems<S>, page_limit: u32, route: Route) -> Self {
        let view = Self::mount(&api, page_limit, route);
        Self {
            api,
            pinned,
            page_limit,
            view,
            notice: None,
            should_quit: false,
        }
    }

    fn mount(api: &Arc<A>, page_limit: u32, route: Route) -> View<A> {
        match route {
            Route::List => {
                let mut controller = ListController::new(Arc::clone(api), page_limit);
                controller.submit();
                controller.start_auto_refresh();
                View::List(ListView {
                    controller,
                    charts: ChartState::new(Arc::clone(api)),
                    selected: 0,
                    input_mode: InputMode::Normal,
                })
            }
            Route::Detail(id) => {
                let mut controller = DetailController::new(Arc::clone(api));
                controller.enter(id.as_deref());
                View::Detail(controller)
            }
        }
    }

    pub fn navigate(&mut self, route: Route) {
        info!(?route, "Navigating");
        match &mut self.view {
            View::List(list) => {
                list.controller.shutdown();
                list.charts.shutdown();
            }
            View::Detail(detail) => detail.shutdown(),
        }
        self.view = Self::mount(&self.api, self.page_limit, route);
        self.notice = None;
    }

    pub fn route(&self) -> Route {
        match &self.view {
            View::List(_) => Route::List,
            View::Detail(detail) => Route::Detail(detail.item_id().map(str::to_string)),
        }
    }

    pub fn view(&self) -> &View<A> {
        &self.view
    }

    pub fn pinned(&self) -> &PinnedItems<S> {
        &self.pinned
    }

    /// Applies finished background work. Returns true if a redraw is due.
    pub fn tick(&mut self) -> bool {
        match &mut self.view {
            View::List(list) => {
                let changed = list.controller.process_pending() | list.charts.process_pending();
                let rows = list.controller.items().len();
                list.selected = list.selected.min(rows.saturating_sub(1));
                changed
            }
            View::Detail(detail) => detail.process_pending(),
        }
    }

    /// Current page in display order.
    pub fn sorted_rows(&self) -> Vec<&Item> {
        match &self.view {
            View::List(list) => {
                sort_rows(list.controller.items(), |id| self.pinned.is_pinned(id))
            }
            View::Detail(_) => Vec::new(),
        }
    }

    pub fn selected_id(&self) -> Option<ItemId> {
        let View::List(list) = &self.view else {
            return None;
        };
        self.sorted_rows().get(list.selected).map(|item| item.item_id)
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        let mode = match &self.view {
            View::List(list) => Some(list.input_mode),
            View::Detail(_) => None,
        };
        match mode {
            Some(InputMode::Search) => self.handle_search_key(key),
            Some(InputMode::Normal) => self.handle_list_key(key).await,
            None => self.handle_detail_key(key),
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let View::List(list) = &mut self.view else { return };
        match key.code {
            KeyCode::Char(c) => {
                let mut query = list.controller.query().to_string();
                query.push(c);
                list.controller.set_query(query);
            }
            KeyCode::Backspace => {
                let mut query = list.controller.query().to_string();
                query.pop();
                list.controller.set_query(query);
            }
            KeyCode::Enter => {
                list.controller.submit();
                list.input_mode = InputMode::Normal;
                list.selected = 0;
            }
            KeyCode::Esc => list.input_mode = InputMode::Normal,
            _ => {}
        }
    }

    async fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Char('p') => self.toggle_pin().await,
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    self.navigate(Route::Detail(Some(id.to_string())));
                }
            }
            code => {
                let rows = self.sorted_rows().len();
                let selected = self.selected_id();
                let View::List(list) = &mut self.view else { return };
                match code {
                    KeyCode::Char('/') => list.input_mode = InputMode::Search,
                    KeyCode::Down | KeyCode::Char('j') => {
                        list.selected = (list.selected + 1).min(rows.saturating_sub(1));
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        list.selected = list.selected.saturating_sub(1);
                    }
                    KeyCode::Char('c') | KeyCode::Char(' ') => {
                        if let Some(id) = selected {
                            list.charts.toggle(id);
                        }
                    }
                    KeyCode::Char('n') | KeyCode::Right => {
                        list.controller.next_page();
                        list.selected = 0;
                    }
                    KeyCode::Char('N') | KeyCode::Left => {
                        list.controller.prev_page();
                        list.selected = 0;
                    }
                    KeyCode::Char('r') | KeyCode::Char('R') => list.controller.refresh(),
                    _ => {}
                }
            }
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => self.navigate(Route::List),
            _ => {}
        }
    }

    async fn toggle_pin(&mut self) {
        let Some(id) = self.selected_id() else { return };
        match self.pinned.toggle(id).await {
            Ok(_) => self.notice = None,
            Err(e) => {
                error!(item_id = %id, "Failed to save pinned items: {e}");
                self.notice = Some(format!("Failed to save pinned items: {e}"));
            }
        }
        // Keep the cursor on the row that just moved.
        let position = self.sorted_rows().iter().position(|item| item.item_id == id);
        if let (View::List(list), Some(position)) = (&mut self.view, position) {
            list.selected = position;
        }
    }
}
