//! Error types for the capability engine.
//!
//! Pure operations (classification, unification, filtering, sorting and
//! inheritance resolution) never fail. Everything here comes from the
//! asynchronous boundaries: reloading a scope, computing a project diff and
//! writing an export. None is retried by the engine; the caller decides what
//! to do.

use thiserror::Error;

/// Engine result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error category for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The external scope loader rejected a reload
    Reload,
    /// The external diff computation rejected a comparison
    Diff,
    /// Filesystem watcher setup or delivery failed
    Watch,
    /// The ingestion session was already stopped
    Session,
    /// A comparison export could not be rendered or written
    Export,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reload => "RELOAD_ERROR",
            Self::Diff => "DIFF_ERROR",
            Self::Watch => "WATCH_ERROR",
            Self::Session => "SESSION_ERROR",
            Self::Export => "EXPORT_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to reload {scope} scope: {message}")]
    Reload { scope: String, message: String },

    #[error("failed to compare {left} with {right}: {message}")]
    Diff {
        left: String,
        right: String,
        message: String,
    },

    #[error("filesystem watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("change ingestion session has stopped")]
    SessionClosed,

    #[error("failed to write export {path}: {source}")]
    Export {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Reload { .. } => ErrorCategory::Reload,
            Self::Diff { .. } => ErrorCategory::Diff,
            Self::Watch(_) => ErrorCategory::Watch,
            Self::SessionClosed => ErrorCategory::Session,
            Self::Export { .. } | Self::Serialize(_) => ErrorCategory::Export,
        }
    }

    /// Create a reload error
    pub fn reload(scope: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Reload {
            scope: scope.to_string(),
            message: message.into(),
        }
    }

    /// Create a diff error
    pub fn diff(
        left: impl Into<String>,
        right: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Diff {
            left: left.into(),
            right: right.into(),
            message: message.into(),
        }
    }

    /// Create an export write error
    pub fn export(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Export {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
