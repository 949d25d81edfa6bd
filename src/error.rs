//! Error types for the scene editing engine.

use thiserror::Error;

/// Result type alias for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors that can occur while editing and syncing a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Automerge error during document operations.
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    /// Autosurgeon hydration error.
    #[error("Hydration error: {0}")]
    Hydrate(#[from] autosurgeon::HydrateError),

    /// Autosurgeon reconcile error.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] autosurgeon::ReconcileError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote store answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The remote store could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Line not found in the scene.
    #[error("Line not found: {0}")]
    LineNotFound(i64),

    /// Field not found in the document.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Character names must be non-empty and distinct, and lines must use one of them.
    #[error("Invalid character: {0}")]
    InvalidCharacter(String),

    /// Session storage rejected a write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Schema violation - document structure is invalid.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// No line is currently being edited.
    #[error("No line is being edited")]
    NoActiveEdit,
}

impl SceneError {
    /// Creates an Api error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a Transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a LineNotFound error.
    pub fn line_not_found(id: i64) -> Self {
        Self::LineNotFound(id)
    }

    /// Creates a FieldNotFound error.
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound(field.into())
    }

    /// Creates an InvalidCharacter error.
    pub fn invalid_character(msg: impl Into<String>) -> Self {
        Self::InvalidCharacter(msg.into())
    }

    /// Creates a Storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a SchemaViolation error.
    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// True when the remote store reports the addressed record is gone.
    ///
    /// Used to drop history entries whose line was never (re)created remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. } | Self::LineNotFound(_))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for SceneError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::api(status.as_u16(), err.to_string()),
            None => Self::transport(err.to_string()),
        }
    }
}
