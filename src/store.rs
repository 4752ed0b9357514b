//! The label queue: the only owner of [`LabelItem`]s.
//!
//! Pipelines and user actions never touch the collection directly. They go
//! through four operations: [`append`](LabelStore::append),
//! [`patch`](LabelStore::patch), [`remove`](LabelStore::remove) and
//! [`clear`](LabelStore::clear), all keyed by [`LabelId`]. Write-backs from
//! concurrent pipelines touch disjoint ids, so their order does not matter,
//! and a write-back for an id that was removed meanwhile is a silent no-op.

use crate::item::{LabelId, LabelItem};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Shared, cloneable handle to the label queue.
#[derive(Debug, Clone, Default)]
pub struct LabelStore {
    items: Arc<RwLock<Vec<LabelItem>>>,
}

impl LabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LabelItem>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<LabelItem>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append items to the end of the queue, preserving their order.
    pub fn append(&self, new_items: impl IntoIterator<Item = LabelItem>) {
        let mut items = self.write();
        let before = items.len();
        items.extend(new_items);
        debug!("Queue: appended {} item(s)", items.len() - before);
    }

    /// Apply `f` to the item with `id`.
    ///
    /// Returns `false` (and does nothing) when the id is not in the queue.
    pub fn patch(&self, id: LabelId, f: impl FnOnce(&mut LabelItem)) -> bool {
        let mut items = self.write();
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                f(item);
                true
            }
            None => {
                debug!("Queue: dropped write-back for removed item {}", id);
                false
            }
        }
    }

    /// Remove the item with `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: LabelId) -> bool {
        let mut items = self.write();
        let before = items.len();
        items.retain(|item| item.id != id);
        before != items.len()
    }

    /// Drop every item. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut items = self.write();
        let n = items.len();
        items.clear();
        n
    }

    pub fn get(&self, id: LabelId) -> Option<LabelItem> {
        self.read().iter().find(|item| item.id == id).cloned()
    }

    pub fn contains(&self, id: LabelId) -> bool {
        self.read().iter().any(|item| item.id == id)
    }

    /// Snapshot of the whole queue in insertion order.
    pub fn snapshot(&self) -> Vec<LabelItem> {
        self.read().clone()
    }

    /// Snapshot of the `Ready` items in insertion order.
    pub fn ready_items(&self) -> Vec<LabelItem> {
        self.read()
            .iter()
            .filter(|item| item.is_ready())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
