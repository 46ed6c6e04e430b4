//! Error types for canvas-store.

use std::path::PathBuf;

use thiserror::Error;

use canvas_core::{NodeId, Service, ServiceError};

/// All errors that can arise from the file-backed collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so `~/.canvas/` cannot be located.
    #[error("cannot determine home directory; set $HOME or pass an explicit data root")]
    HomeNotFound,

    /// A record id or folder key that cannot be used as a file name.
    #[error("invalid key '{0}': must be non-empty and free of path separators")]
    InvalidKey(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("folder not found at {path}")]
    FolderNotFound { path: PathBuf },
}

impl StoreError {
    /// Wraps this error as a failure of the given collaborator.
    pub fn into_service(self, service: Service) -> ServiceError {
        ServiceError::new(service, self)
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
