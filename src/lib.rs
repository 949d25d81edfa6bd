//! HeyoScene - Scene editing engine for two-character rehearsal scripts.
//!
//! Keeps a local, CRDT-backed view of one scene in sync with a remote scene
//! store while the user edits it:
//!
//! - **Optimistic writes**: every change lands in the view before the store is called
//! - **Debounced autosave**: typing in a line is saved after a short idle delay
//! - **Undo/redo**: scene fields, lines, reorders, adds, deletes, resets and
//!   client-only choices (voices, rehearsed character) are all undoable
//! - **Exit flush**: unsaved typing is delivered even when the editor goes away
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heyoscene::{EditorConfig, HttpSceneStore, LineValues, MemoryStorage, SceneEditor};
//!
//! # async fn run() -> heyoscene::SceneResult<()> {
//! let config = EditorConfig::from_env();
//! let store = Arc::new(HttpSceneStore::new("https://api.example.com", None)?);
//! let editor = SceneEditor::open(store, 42, Arc::new(MemoryStorage::new()), &config).await?;
//!
//! editor.start_edit(7).await?;
//! editor.update_draft(LineValues::new("SAM", "Where were you last night?"))?;
//! editor.commit_if_dirty().await?;
//!
//! editor.undo().await?;
//! # Ok(())
//! # }
//! ```

pub mod autosave;
pub mod config;
pub mod draft;
pub mod editor;
pub mod error;
pub mod flush;
pub mod history;
pub mod notice;
pub mod reorder;
pub mod scene;
pub mod shortcuts;
pub mod storage;
pub mod store;
pub mod sync;
pub mod view;

// Re-exports for convenience
pub use autosave::AutosaveScheduler;
pub use config::EditorConfig;
pub use draft::{DraftBuffer, DraftEntry};
pub use editor::{CommitOutcome, SceneEditor};
pub use error::{SceneError, SceneResult};
pub use flush::{ExitReason, FlushCoordinator};
pub use history::{ApplyOutcome, Direction, HistoryEngine, HistoryEntry, HistoryStore};
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use reorder::ReorderSession;
pub use scene::{Line, LineValues, NewLine, Scene, SceneDocument, SceneField, ScenePatch};
pub use shortcuts::{Focus, KeyInput, Shortcut};
pub use storage::{
    ClientSettingsStore, FileStorage, MemoryStorage, RehearsalSettings, SessionStorage, VoiceMap,
};
pub use store::SceneStore;
pub use sync::{OptimisticWrite, WriteState};
pub use view::{SceneView, SharedView};

#[cfg(feature = "http")]
pub use store::HttpSceneStore;
