pub mod charts;
pub mod pinned;

pub use charts::{ChartState, ChartView};
pub use pinned::PinnedItems;

use crate::types::{Item, ItemId};

/// Display order for a page of items: pinned rows first, then the rest, each
/// group ascending by `item_id`. The server's sequence is left untouched.
pub fn sort_rows(items: &[Item], is_pinned: impl Fn(ItemId) -> bool) -> Vec<&Item> {
    let mut rows: Vec<&Item> = items.iter().collect();
    rows.sort_by_key(|item| (!is_pinned(item.item_id), item.item_id));
    rows
}
