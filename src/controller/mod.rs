pub mod detail;
pub mod list;

pub use detail::{DetailController, DetailState, HistoryState};
pub use list::ListController;

/// Screens of the tracker. `Detail` carries the raw id from the route so that
/// validation happens inside the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    List,
    Detail(Option<String>),
}
