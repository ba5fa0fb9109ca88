//! Tailwatch: watch paths, tail appended lines, filter them and forward the
//! survivors to senders.
//!
//! ```no_run
//! use tailwatch::{KeywordFilter, Monitor, ObserveOptions, WriterSender};
//!
//! let monitor = Monitor::new()?;
//! monitor.observe(
//!     "/var/log/app",
//!     ObserveOptions::new()
//!         .sender(WriterSender::stdout())
//!         .filter(KeywordFilter::new("DEBUG|TRACE")),
//! )?;
//! # Ok::<(), tailwatch::MonitorError>(())
//! ```

#[macro_use]
pub mod logging;

pub mod cli;
pub mod config;
pub mod filter;
pub mod monitor;
pub mod sender;
pub mod watcher;

pub use config::{ConfigError, Settings};
pub use filter::{Filter, FilterChain, FilterError, FilterFn, KeywordFilter, RateLimiter};
pub use monitor::{FileTailer, Monitor, MonitorError, ObserveOptions, TailError, TailState};
pub use sender::{ChannelSender, LineSender, SharedSender, WebhookFormat, WebhookSender, WriterSender};
pub use watcher::{Event, EventHandler, Op, PathWatcher, WatchError, WatcherConfig};
