use std::path::PathBuf;
use thiserror::Error;

/// Failures of the artifact store. Nothing here is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run {0} already exists")]
    RunExists(String),

    #[error("invalid run id or artifact name: {0:?}")]
    InvalidName(String),

    #[error("artifact already written: {0}")]
    ArtifactExists(PathBuf),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("publish lock for run {0} is already held")]
    LockHeld(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
