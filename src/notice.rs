//! Dismissible user-facing notices ("toasts").
//!
//! Nothing in the engine is fatal; failures end up here plus a state re-sync.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

/// Shared queue of pending notices. Clones point at the same queue.
#[derive(Debug, Clone, Default)]
pub struct NoticeBoard {
    pending: Arc<Mutex<VecDeque<Notice>>>,
    next_id: Arc<AtomicU64>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.post(NoticeLevel::Info, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.post(NoticeLevel::Error, message.into())
    }

    fn post(&self, level: NoticeLevel, message: String) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending.lock().push_back(Notice { id, level, message });
        id
    }

    /// Removes one notice. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|n| n.id != id);
        pending.len() != before
    }

    /// Copy of the pending notices, oldest first.
    pub fn pending(&self) -> Vec<Notice> {
        self.pending.lock().iter().cloned().collect()
    }

    /// Drains every pending notice.
    pub fn take_all(&self) -> Vec<Notice> {
        self.pending.lock().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_and_dismiss() {
        let board = NoticeBoard::new();
        let shared = board.clone();
        let first = board.error("Could not save line");
        let second = shared.info("Scene reset");

        assert_eq!(board.pending().len(), 2);
        assert!(board.dismiss(first));
        assert!(!board.dismiss(first));

        let rest = shared.take_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, second);
        assert_eq!(rest[0].level, NoticeLevel::Info);
        assert!(board.is_empty());
    }
}
