//! Error types for the monitor and file tailers.

use std::path::PathBuf;
use thiserror::Error;

use crate::watcher::{HandlerError, WatchError};

/// Errors from a single file tailer.
#[derive(Error, Debug)]
pub enum TailError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to seek in {path}: {source}")]
    Seek {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from observing paths and handling their events.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("No senders configured for {path}")]
    NoSenders { path: PathBuf },

    #[error("Event for {path} rejected by intercept: {source}")]
    Intercepted {
        path: PathBuf,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Tail(#[from] TailError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
