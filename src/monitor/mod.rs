//! Top-level orchestration: observed roots to per-file tailers.
//!
//! [`Monitor::observe`] binds senders, filters and intercepts to a root path
//! (file or directory) and registers a [`RootHandler`] for it with the
//! [`PathWatcher`]. Tailers are created lazily the first time a concrete file
//! under the root changes.

mod error;
mod options;
mod registry;
mod tailer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::watcher::{
    Event, EventHandler, HandlerError, Op, PathWatcher, WatchError, WatcherConfig, absolutize,
};

pub use error::{MonitorError, MonitorResult, TailError};
pub use options::{Intercept, ObserveOptions};
pub use registry::{SharedTailer, TailerRegistry};
pub use tailer::{FileTailer, TailState};

/// Dispatch target registered with the watcher for one observed root.
pub struct RootHandler {
    root: PathBuf,
    options: ObserveOptions,
    registry: Arc<TailerRegistry>,
}

impl RootHandler {
    fn on_event(&self, event: &Event) -> MonitorResult<()> {
        self.options.run_intercepts(event)?;

        let tailer = if event.op == Op::Delete {
            // Nothing to close for a file we never tailed.
            match self.registry.get(&event.path) {
                Some(tailer) => tailer,
                None => return Ok(()),
            }
        } else {
            if event.path.is_dir() {
                crate::debug_event!("monitor", "skipping directory", "{}", event.path.display());
                return Ok(());
            }
            let made = self.registry.get_or_create(&self.root, &event.path, || {
                FileTailer::new(
                    event.path.clone(),
                    self.options.filter_chain().clone(),
                    self.options.sender_list().to_vec(),
                )
            });
            match made {
                Some(tailer) => tailer,
                None => return Ok(()),
            }
        };

        let (result, closed) = {
            let mut guard = tailer.lock();
            let result = guard.handle(event);
            (result, guard.is_closed())
        };

        if closed && self.registry.retire(&event.path, &tailer) {
            crate::debug_event!("monitor", "retired", "{}", event.path.display());
        }

        result?;
        Ok(())
    }
}

impl EventHandler for RootHandler {
    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        self.on_event(event).map_err(|e| Box::new(e) as HandlerError)
    }
}

/// Watches roots and ships appended lines to their senders.
pub struct Monitor {
    watcher: PathWatcher,
    registry: Arc<TailerRegistry>,
}

impl Monitor {
    pub fn new() -> MonitorResult<Self> {
        Self::with_config(WatcherConfig::default())
    }

    pub fn with_config(config: WatcherConfig) -> MonitorResult<Self> {
        Ok(Self {
            watcher: PathWatcher::with_config(config)?,
            registry: Arc::new(TailerRegistry::new()),
        })
    }

    /// Start shipping lines appended under `path`.
    ///
    /// `options` must name at least one sender; this is checked before
    /// anything is registered. Observing a root that is already observed is
    /// a silent no-op and the new options are ignored.
    pub fn observe(&self, path: impl AsRef<Path>, options: ObserveOptions) -> MonitorResult<()> {
        let root = absolutize(path)?;
        options.validate(&root)?;

        if !self.registry.add_root(root.clone()) {
            crate::debug_event!("monitor", "already observed", "{}", root.display());
            return Ok(());
        }

        let handler = RootHandler {
            root: root.clone(),
            options,
            registry: self.registry.clone(),
        };
        if let Err(e) = self.watcher.add_watch(&root, Arc::new(handler)) {
            self.registry.remove_root(&root);
            return Err(e.into());
        }

        crate::log_event!("monitor", "observing", "{}", root.display());
        Ok(())
    }

    /// Stop observing `path`: close its tailers and release its watch.
    ///
    /// Returns the number of tailers closed. Like [`Monitor::close`], this
    /// must not be called from a sender or intercept: the event loop holds
    /// the tailer being handled and closing it would wait on itself.
    pub fn unobserve(&self, path: impl AsRef<Path>) -> usize {
        let root = absolutize(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf());

        let Some(closed) = self.registry.remove_root(&root) else {
            crate::debug_event!("monitor", "not observed", "{}", root.display());
            return 0;
        };
        self.watcher.remove_watch(&root);

        crate::log_event!("monitor", "unobserved", "{} ({closed} files closed)", root.display());
        closed
    }

    /// Route an event through the watcher as if the backend reported it.
    pub fn dispatch(&self, event: &Event) -> Result<bool, WatchError> {
        self.watcher.dispatch(event)
    }

    pub fn is_observed(&self, path: impl AsRef<Path>) -> bool {
        absolutize(path)
            .map(|root| self.registry.contains_root(&root))
            .unwrap_or(false)
    }

    pub fn observed_roots(&self) -> Vec<PathBuf> {
        self.registry.roots()
    }

    /// Number of live tailers across all roots.
    pub fn tailer_count(&self) -> usize {
        self.registry.file_count()
    }

    pub fn tailer(&self, path: impl AsRef<Path>) -> Option<SharedTailer> {
        absolutize(path).ok().and_then(|p| self.registry.get(&p))
    }

    pub fn watcher(&self) -> &PathWatcher {
        &self.watcher
    }

    /// Stop watching and close every tailer. Must not be called from a
    /// sender or intercept.
    pub fn close(&self) {
        self.watcher.close();
        for root in self.registry.roots() {
            self.registry.remove_root(&root);
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("roots", &self.observed_roots())
            .field("tailers", &self.tailer_count())
            .finish()
    }
}
