//! Path watching on top of the native notification backend.
//!
//! # Architecture
//!
//! ```text
//! PathWatcher
//!   - Single notify::RecommendedWatcher
//!   - HandlerRegistry (absolute path -> handler)
//!   - Pending set for paths that do not exist yet
//!         |
//!    event loop: classify -> resolve (exact, then parent dir) -> handler
//!    retry loop: recheck pending paths every retry interval
//! ```

mod error;
mod event;
mod handler;
mod path_watcher;
mod registry;

pub use error::{HandlerError, WatchError};
pub use event::{Event, Op, classify};
pub use handler::EventHandler;
pub use path_watcher::{DEFAULT_RETRY_INTERVAL, PathWatcher, WatcherConfig, absolutize};
pub use registry::HandlerRegistry;
