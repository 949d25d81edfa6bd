//! Draft buffer: the single line currently being edited.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{SceneError, SceneResult};
use crate::scene::LineValues;

pub type SharedDrafts = Arc<Mutex<DraftBuffer>>;

/// In-progress values for one line.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftEntry {
    pub line_id: i64,
    /// What the user has typed so far
    pub draft: LineValues,
    /// Last values the store accepted for this line (autosave marker)
    pub last_autosaved: LineValues,
    /// Values when the edit started; an explicit commit records history against these
    pub committed: LineValues,
}

impl DraftEntry {
    fn new(line_id: i64, values: LineValues) -> Self {
        Self {
            line_id,
            draft: values.clone(),
            last_autosaved: values.clone(),
            committed: values,
        }
    }

    /// Typed values the store has not seen yet.
    pub fn is_unsaved(&self) -> bool {
        self.draft != self.last_autosaved
    }

    /// An explicit commit would change something remotely.
    pub fn needs_commit(&self) -> bool {
        self.draft.normalized() != self.committed || self.last_autosaved != self.committed
    }
}

/// Holds at most one draft.
#[derive(Debug, Default)]
pub struct DraftBuffer {
    active: Option<DraftEntry>,
}

impl DraftBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedDrafts {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Opens a draft seeded from the line's current values, returning any
    /// draft it replaces.
    pub fn open(&mut self, line_id: i64, values: LineValues) -> Option<DraftEntry> {
        self.active.replace(DraftEntry::new(line_id, values))
    }

    pub fn active(&self) -> Option<&DraftEntry> {
        self.active.as_ref()
    }

    pub fn active_line_id(&self) -> Option<i64> {
        self.active.as_ref().map(|d| d.line_id)
    }

    /// Records a keystroke. Returns whether the draft now differs from the
    /// autosave marker.
    pub fn update(&mut self, values: LineValues) -> SceneResult<bool> {
        let entry = self.active.as_mut().ok_or(SceneError::NoActiveEdit)?;
        entry.draft = values;
        Ok(entry.is_unsaved())
    }

    /// Moves the autosave marker after the store accepted `values`.
    pub fn mark_autosaved(&mut self, line_id: i64, values: &LineValues) -> bool {
        match self.active.as_mut() {
            Some(entry) if entry.line_id == line_id => {
                entry.last_autosaved = values.clone();
                true
            }
            _ => false,
        }
    }

    /// Settles an explicit commit of `sent` (normalized to `saved`). The
    /// draft closes unless the user kept typing meanwhile, in which case it
    /// stays open with `saved` as its new baseline.
    pub fn settle_commit(&mut self, line_id: i64, sent: &LineValues, saved: &LineValues) {
        let Some(entry) = self.active.as_mut().filter(|e| e.line_id == line_id) else {
            return;
        };
        if entry.draft == *sent {
            self.active = None;
        } else {
            entry.committed = saved.clone();
            entry.last_autosaved = saved.clone();
        }
    }

    /// Follows a character rename so the draft never writes the old name back.
    pub fn rename_character(&mut self, from: &str, to: &str) {
        let Some(entry) = self.active.as_mut() else {
            return;
        };
        for values in [
            &mut entry.draft,
            &mut entry.last_autosaved,
            &mut entry.committed,
        ] {
            if values.character_name == from {
                values.character_name = to.to_string();
            }
        }
    }

    /// Closes the draft of `line_id` if it is the active one.
    pub fn close(&mut self, line_id: i64) -> Option<DraftEntry> {
        if self.active_line_id() == Some(line_id) {
            self.active.take()
        } else {
            None
        }
    }

    /// Closes whatever draft is open.
    pub fn take(&mut self) -> Option<DraftEntry> {
        self.active.take()
    }
}
