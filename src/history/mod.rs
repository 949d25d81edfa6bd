//! Undo/redo history for scene edits.
//!
//! This module provides:
//! - `entry`: the reversible `HistoryEntry` union and apply `Direction`
//! - `stack`: linear undo/redo stacks and the per-scene `HistoryStore`
//! - `engine`: `HistoryEngine`, which replays entries against the view and the store

pub mod engine;
pub mod entry;
pub mod stack;

pub use engine::{ApplyOutcome, HistoryEngine};
pub use entry::{Direction, HistoryEntry};
pub use stack::{HistoryHandle, HistoryRecord, HistoryStack, HistoryStore, DEFAULT_HISTORY_LIMIT};
