//! Error types for the path watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by event handlers and intercepts.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot resolve path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Permission denied watching {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Handler failed for {path}: {source}")]
    HandlerFailed {
        path: PathBuf,
        #[source]
        source: HandlerError,
    },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

impl WatchError {
    /// Map a failed low-level registration for `path` to a typed error.
    pub(crate) fn from_registration(path: PathBuf, e: notify::Error) -> Self {
        let denied = match &e.kind {
            notify::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        };

        if denied {
            WatchError::PermissionDenied { path }
        } else {
            WatchError::PathWatchFailed {
                path,
                reason: e.to_string(),
            }
        }
    }
}
