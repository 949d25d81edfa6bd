//! Undo/redo stacks and their per-scene persistence.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::entry::HistoryEntry;
use crate::storage::{load_json, store_json, SessionStorage};

/// Default maximum undo depth.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// A history entry owned by the stack, addressed by a stable local key.
///
/// The key survives moves between the undo and redo stacks, so an apply that
/// learns a new remote line ID after an await can still find its entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub key: Uuid,
    pub entry: HistoryEntry,
}

/// Linear undo/redo history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryStack {
    undo: Vec<HistoryRecord>,
    redo: Vec<HistoryRecord>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to undo and clears redo. The oldest entries drop past `limit`.
    pub fn push(&mut self, entry: HistoryEntry, limit: usize) -> Uuid {
        let key = Uuid::new_v4();
        self.undo.push(HistoryRecord { key, entry });
        self.redo.clear();
        if self.undo.len() > limit {
            let excess = self.undo.len() - limit;
            self.undo.drain(..excess);
        }
        key
    }

    /// Moves the top undo record onto redo and returns a copy of it.
    pub fn take_undo(&mut self) -> Option<HistoryRecord> {
        let record = self.undo.pop()?;
        self.redo.push(record.clone());
        Some(record)
    }

    /// Moves the top redo record onto undo and returns a copy of it.
    pub fn take_redo(&mut self) -> Option<HistoryRecord> {
        let record = self.redo.pop()?;
        self.undo.push(record.clone());
        Some(record)
    }

    /// Rewrites line `old` to `new` in every record of both stacks.
    pub fn remap_line_id(&mut self, old: i64, new: i64) -> usize {
        self.undo
            .iter_mut()
            .chain(self.redo.iter_mut())
            .filter_map(|r| r.entry.remap_line_id(old, new).then_some(()))
            .count()
    }

    /// Removes the record with `key` from whichever stack holds it.
    pub fn remove(&mut self, key: Uuid) -> Option<HistoryEntry> {
        for stack in [&mut self.undo, &mut self.redo] {
            if let Some(pos) = stack.iter().position(|r| r.key == key) {
                return Some(stack.remove(pos).entry);
            }
        }
        None
    }

    /// Looks up a record by key.
    pub fn get(&self, key: Uuid) -> Option<&HistoryEntry> {
        self.undo
            .iter()
            .chain(self.redo.iter())
            .find(|r| r.key == key)
            .map(|r| &r.entry)
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Entries on the undo stack, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo.iter().map(|r| &r.entry)
    }

    /// Entries on the redo stack, oldest first.
    pub fn redo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.redo.iter().map(|r| &r.entry)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

// =============================================================================
// STORE / HANDLE
// =============================================================================

/// Hands out per-scene history handles backed by session storage.
#[derive(Clone)]
pub struct HistoryStore {
    storage: Arc<dyn SessionStorage>,
    limit: usize,
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Builder: Set the maximum undo depth.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Opens the history of `scene_id`, restoring whatever the session kept.
    pub fn open(&self, scene_id: i64) -> HistoryHandle {
        let storage_key = format!("scene-history:{}", scene_id);
        let stack = load_json(self.storage.as_ref(), &storage_key).unwrap_or_default();
        HistoryHandle {
            scene_id,
            storage_key,
            storage: self.storage.clone(),
            limit: self.limit,
            stack: Mutex::new(stack),
        }
    }
}

/// History of one scene. All stack mutation goes through here and is
/// persisted right away; failed writes leave the in-memory stacks authoritative.
pub struct HistoryHandle {
    scene_id: i64,
    storage_key: String,
    storage: Arc<dyn SessionStorage>,
    limit: usize,
    stack: Mutex<HistoryStack>,
}

impl HistoryHandle {
    pub fn scene_id(&self) -> i64 {
        self.scene_id
    }

    pub fn push(&self, entry: HistoryEntry) -> Uuid {
        debug!(scene_id = self.scene_id, kind = entry.kind(), "history push");
        self.mutate(|stack| stack.push(entry, self.limit))
    }

    pub fn take_undo(&self) -> Option<HistoryRecord> {
        self.mutate(|stack| stack.take_undo())
    }

    pub fn take_redo(&self) -> Option<HistoryRecord> {
        self.mutate(|stack| stack.take_redo())
    }

    pub fn remap_line_id(&self, old: i64, new: i64) -> usize {
        self.mutate(|stack| stack.remap_line_id(old, new))
    }

    pub fn remove(&self, key: Uuid) -> Option<HistoryEntry> {
        self.mutate(|stack| stack.remove(key))
    }

    pub fn clear(&self) {
        self.mutate(|stack| stack.clear())
    }

    pub fn undo_len(&self) -> usize {
        self.stack.lock().undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.stack.lock().redo_len()
    }

    /// Copy of both stacks.
    pub fn snapshot(&self) -> HistoryStack {
        self.stack.lock().clone()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut HistoryStack) -> R) -> R {
        let mut stack = self.stack.lock();
        let result = f(&mut stack);
        store_json(self.storage.as_ref(), &self.storage_key, &*stack);
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================
