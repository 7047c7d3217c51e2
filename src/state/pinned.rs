use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PINNED_ITEMS_KEY;
use crate::error::Result;
use crate::storage::KeyValueStore;
use crate::types::ItemId;

/// User-pinned rows, persisted under [`PINNED_ITEMS_KEY`] as a JSON array of
/// item ids. Loaded once at startup; every toggle writes the whole set back.
pub struct PinnedItems<S> {
    store: Arc<S>,
    ids: BTreeSet<ItemId>,
}

impl<S: KeyValueStore> PinnedItems<S> {
    /// Reads the stored set. A missing key is an empty set; an unreadable value
    /// is logged and also treated as empty.
    pub async fn load(store: Arc<S>) -> Result<Self> {
        let ids = match store.get(PINNED_ITEMS_KEY).await? {
            Some(raw) => match serde_json::from_str::<Vec<ItemId>>(&raw) {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    warn!("Failed to load pinned items, starting empty: {e}");
                    BTreeSet::new()
                }
            },
            None => BTreeSet::new(),
        };
        info!(count = ids.len(), "Loaded pinned items");
        Ok(Self { store, ids })
    }

    pub fn is_pinned(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Flips membership of `id` and persists immediately. Returns whether the
    /// item is pinned afterwards. On a storage error the in-memory set keeps
    /// the new membership.
    pub async fn toggle(&mut self, id: ItemId) -> Result<bool> {
        let pinned = if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        };
        info!(item_id = %id, pinned, "Pin toggled");
        self.persist().await?;
        Ok(pinned)
    }

    async fn persist(&self) -> Result<()> {
        if self.ids.is_empty() {
            return self.store.remove(PINNED_ITEMS_KEY).await;
        }
        let ids: Vec<ItemId> = self.ids.iter().copied().collect();
        let encoded = serde_json::to_string(&ids)?;
        self.store.set(PINNED_ITEMS_KEY, &encoded).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn missing_key_is_empty_set() {
        let pinned = PinnedItems::load(Arc::new(MemoryStore::new())).await.unwrap();
        assert!(pinned.is_empty());
    }

    #[tokio::test]
    async fn toggle_writes_through_and_reloads() {
        let store = Arc::new(MemoryStore::new());
        let mut pinned = PinnedItems::load(Arc::clone(&store)).await.unwrap();

        assert!(pinned.toggle(ItemId(4151)).await.unwrap());
        assert!(pinned.toggle(ItemId(2)).await.unwrap());
        assert_eq!(
            store.get(PINNED_ITEMS_KEY).await.unwrap().as_deref(),
            Some("[2,4151]")
        );

        let reloaded = PinnedItems::load(Arc::clone(&store)).await.unwrap();
        assert!(reloaded.is_pinned(ItemId(4151)));
        assert!(reloaded.is_pinned(ItemId(2)));
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn double_toggle_restores_membership() {
        let store = Arc::new(MemoryStore::new());
        store.set(PINNED_ITEMS_KEY, "[7]").await.unwrap();
        let mut pinned = PinnedItems::load(Arc::clone(&store)).await.unwrap();

        for id in [ItemId(7), ItemId(8)] {
            let before = pinned.is_pinned(id);
            pinned.toggle(id).await.unwrap();
            pinned.toggle(id).await.unwrap();
            assert_eq!(pinned.is_pinned(id), before);
        }
        assert_eq!(store.get(PINNED_ITEMS_KEY).await.unwrap().as_deref(), Some("[7]"));
    }

    #[tokio::test]
    async fn emptying_the_set_removes_the_key() {
        let store = Arc::new(MemoryStore::new());
        let mut pinned = PinnedItems::load(Arc::clone(&store)).await.unwrap();

        pinned.toggle(ItemId(1)).await.unwrap();
        assert!(store.contains_key(PINNED_ITEMS_KEY));
        pinned.toggle(ItemId(1)).await.unwrap();
        assert!(!store.contains_key(PINNED_ITEMS_KEY));
    }

    #[tokio::test]
    async fn corrupt_value_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(PINNED_ITEMS_KEY, "{not json").await.unwrap();
        let pinned = PinnedItems::load(store).await.unwrap();
        assert!(pinned.is_empty());
    }
}
