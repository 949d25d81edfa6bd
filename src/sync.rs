//! Optimistic write bookkeeping.
//!
//! Local state is mutated before the remote store confirms. Each such
//! mutation keeps the snapshot needed to undo it and moves through
//! `Pending -> Committed | RolledBack` exactly once.

use tracing::debug;

/// Lifecycle of one optimistic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Pending,
    Committed,
    RolledBack,
}

/// A local mutation awaiting remote confirmation.
#[derive(Debug)]
pub struct OptimisticWrite<T> {
    label: &'static str,
    snapshot: Option<T>,
    state: WriteState,
}

impl<T> OptimisticWrite<T> {
    /// Starts a write, keeping `snapshot` of the state it replaces.
    pub fn begin(label: &'static str, snapshot: T) -> Self {
        Self {
            label,
            snapshot: Some(snapshot),
            state: WriteState::Pending,
        }
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The pre-write snapshot, while still pending.
    pub fn snapshot(&self) -> Option<&T> {
        self.snapshot.as_ref()
    }

    /// Marks the write confirmed and drops the snapshot.
    pub fn commit(&mut self) -> WriteState {
        if self.state == WriteState::Pending {
            self.snapshot = None;
            self.state = WriteState::Committed;
        }
        self.state
    }

    /// Hands the snapshot to `restore` and marks the write rolled back.
    pub fn rollback(&mut self, restore: impl FnOnce(T)) -> WriteState {
        if self.state == WriteState::Pending {
            if let Some(snapshot) = self.snapshot.take() {
                restore(snapshot);
            }
            self.state = WriteState::RolledBack;
            debug!(write = self.label, "optimistic write rolled back");
        }
        self.state
    }

    /// Commits on `Ok`, rolls back on `Err`.
    pub fn settle<R, E>(&mut self, result: &Result<R, E>, restore: impl FnOnce(T)) -> WriteState {
        match result {
            Ok(_) => self.commit(),
            Err(_) => self.rollback(restore),
        }
    }
}
