//! Scene aggregate: data model and the Automerge-backed document holding it.

pub mod document;
pub mod model;

pub use document::SceneDocument;
pub use model::{
    normalize_whitespace, word_count, Line, LineValues, NewLine, Scene, SceneField, ScenePatch,
};
