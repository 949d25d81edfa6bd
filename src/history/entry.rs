//! Reversible history entries.
//!
//! Every entry keeps both sides of the change so it can be replayed in either
//! direction without asking the remote store.

use serde::{Deserialize, Serialize};

use crate::scene::{Line, LineValues, Scene, SceneField};
use crate::storage::VoiceMap;

/// Which side of an entry to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Restore the state before the change (undo).
    Old,
    /// Restore the state after the change (redo).
    Cur,
}

impl Direction {
    /// Picks the target and the opposite value for this direction.
    pub fn pick<T>(self, old: T, cur: T) -> (T, T) {
        match self {
            Direction::Old => (old, cur),
            Direction::Cur => (cur, old),
        }
    }
}

/// One reversible unit of change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    SceneField {
        field: SceneField,
        old: Option<String>,
        cur: Option<String>,
    },
    Line {
        line_id: i64,
        old: LineValues,
        cur: LineValues,
    },
    Reorder {
        old_order: Vec<i64>,
        cur_order: Vec<i64>,
    },
    Reset {
        old_scene: Box<Scene>,
        cur_scene: Box<Scene>,
    },
    AddLine {
        line_id: i64,
        line: LineValues,
        insert_after_id: Option<i64>,
    },
    DeleteLine {
        line: Line,
        insert_after_id: Option<i64>,
    },
    Voice {
        old: VoiceMap,
        cur: VoiceMap,
    },
    SelectedCharacter {
        old: Option<String>,
        cur: Option<String>,
    },
}

impl HistoryEntry {
    /// Short name used in logs and notices.
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::SceneField { .. } => "scene_field",
            HistoryEntry::Line { .. } => "line",
            HistoryEntry::Reorder { .. } => "reorder",
            HistoryEntry::Reset { .. } => "reset",
            HistoryEntry::AddLine { .. } => "add_line",
            HistoryEntry::DeleteLine { .. } => "delete_line",
            HistoryEntry::Voice { .. } => "voice",
            HistoryEntry::SelectedCharacter { .. } => "selected_character",
        }
    }

    /// True for entries that address a single line by ID. When the store no
    /// longer has that line, the entry cannot be replayed and is dropped.
    pub fn targets_line(&self) -> bool {
        matches!(
            self,
            HistoryEntry::Line { .. }
                | HistoryEntry::AddLine { .. }
                | HistoryEntry::DeleteLine { .. }
        )
    }

    /// Rewrites every reference to line `old` so it points at `new`.
    /// Returns true if anything changed.
    pub fn remap_line_id(&mut self, old: i64, new: i64) -> bool {
        fn swap(id: &mut i64, old: i64, new: i64) -> bool {
            if *id == old {
                *id = new;
                true
            } else {
                false
            }
        }
        fn swap_opt(id: &mut Option<i64>, old: i64, new: i64) -> bool {
            id.as_mut().map(|id| swap(id, old, new)).unwrap_or(false)
        }
        fn swap_all(ids: &mut [i64], old: i64, new: i64) -> bool {
            ids.iter_mut().fold(false, |acc, id| swap(id, old, new) || acc)
        }

        match self {
            HistoryEntry::Line { line_id, .. } => swap(line_id, old, new),
            HistoryEntry::Reorder {
                old_order,
                cur_order,
            } => {
                let a = swap_all(old_order, old, new);
                let b = swap_all(cur_order, old, new);
                a || b
            }
            HistoryEntry::Reset {
                old_scene,
                cur_scene,
            } => {
                let a = old_scene.reassign_line_id(old, new);
                let b = cur_scene.reassign_line_id(old, new);
                a || b
            }
            HistoryEntry::AddLine {
                line_id,
                insert_after_id,
                ..
            } => {
                let a = swap(line_id, old, new);
                let b = swap_opt(insert_after_id, old, new);
                a || b
            }
            HistoryEntry::DeleteLine {
                line,
                insert_after_id,
            } => {
                let a = swap(&mut line.id, old, new);
                let b = swap_opt(insert_after_id, old, new);
                a || b
            }
            HistoryEntry::SceneField { .. }
            | HistoryEntry::Voice { .. }
            | HistoryEntry::SelectedCharacter { .. } => false,
        }
    }
}
