//! Path watcher: native notifications in, classified events out.
//!
//! Two long-lived threads run per watcher:
//! - the event loop, which consumes the `notify` stream, classifies each raw
//!   event and invokes the matching handler synchronously;
//! - the retry loop, which rechecks paths registered before they existed and
//!   promotes them to real watches once they appear.
//!
//! Dispatch is serialized on the event loop. Events for a path are handled
//! in backend order, and a slow handler holds up every other path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select, unbounded};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use super::error::WatchError;
use super::event::{Event, Op, classify};
use super::handler::EventHandler;
use super::registry::HandlerRegistry;

/// Default period between rechecks of not-yet-existing paths.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

type RawEvent = notify::Result<notify::Event>;

/// Tunables for a [`PathWatcher`].
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How often pending paths are rechecked.
    pub retry_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Outcome of one low-level registration attempt.
enum Registration {
    Watching,
    Missing,
}

/// State shared between the public handle and the two loops.
struct Shared {
    registry: HandlerRegistry,
    native: Mutex<Option<RecommendedWatcher>>,
    pending: Mutex<HashSet<PathBuf>>,
}

impl Shared {
    fn watch_native(&self, path: &Path) -> Result<Registration, WatchError> {
        if !path.exists() {
            return Ok(Registration::Missing);
        }

        let mut native = self.native.lock();
        let Some(watcher) = native.as_mut() else {
            return Err(WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: "watcher is closed".to_string(),
            });
        };

        match watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => Ok(Registration::Watching),
            Err(e) if is_not_found(&e) => Ok(Registration::Missing),
            Err(e) => Err(WatchError::from_registration(path.to_path_buf(), e)),
        }
    }

    fn unwatch_native(&self, path: &Path) {
        if let Some(watcher) = self.native.lock().as_mut() {
            if let Err(e) = watcher.unwatch(path) {
                crate::debug_event!("watcher", "unwatch skipped", "{}: {e}", path.display());
            }
        }
    }

    fn defer(&self, path: &Path) {
        if self.pending.lock().insert(path.to_path_buf()) {
            crate::log_event!("watcher", "pending", "{}", path.display());
        }
    }

    /// Register `path` natively, parking it in the pending set if missing.
    fn register(&self, path: &Path) -> Result<(), WatchError> {
        match self.watch_native(path)? {
            Registration::Watching => {
                crate::log_event!("watcher", "watching", "{}", path.display());
            }
            Registration::Missing => self.defer(path),
        }
        Ok(())
    }

    /// Promote every pending path that now exists.
    fn reconcile(&self) {
        let candidates: Vec<PathBuf> = self
            .pending
            .lock()
            .iter()
            .filter(|p| p.exists())
            .cloned()
            .collect();

        for path in candidates {
            if !self.registry.contains(&path) {
                self.pending.lock().remove(&path);
                continue;
            }

            match self.watch_native(&path) {
                Ok(Registration::Watching) => {
                    self.pending.lock().remove(&path);
                    crate::log_event!("watcher", "promoted", "{}", path.display());
                }
                Ok(Registration::Missing) => {}
                Err(WatchError::PermissionDenied { path }) => {
                    self.pending.lock().remove(&path);
                    tracing::warn!("[watcher] giving up on {}: permission denied", path.display());
                }
                Err(e) => {
                    crate::debug_event!("watcher", "retry failed", "{e}");
                }
            }
        }
    }

    fn dispatch(&self, event: &Event) -> Result<bool, WatchError> {
        let Some(handler) = self.registry.resolve(&event.path) else {
            crate::debug_event!("watcher", "unmatched", "{event}");
            return Ok(false);
        };

        let result = handler.handle(event);

        // A watched file that disappears loses its native watch; park it so
        // a recreated file is picked up again.
        if event.op == Op::Delete && self.registry.contains(&event.path) {
            self.unwatch_native(&event.path);
            self.defer(&event.path);
        }

        result.map(|()| true).map_err(|source| WatchError::HandlerFailed {
            path: event.path.clone(),
            source,
        })
    }

    fn process(&self, raw: notify::Event) {
        let events = classify(&raw);
        if events.is_empty() {
            crate::debug_event!("watcher", "skipped", "{:?} {:?}", raw.kind, raw.paths);
            return;
        }

        for event in events {
            if let Err(e) = self.dispatch(&event) {
                tracing::warn!("[watcher] {e}");
            }
        }
    }
}

fn is_not_found(e: &notify::Error) -> bool {
    match &e.kind {
        notify::ErrorKind::PathNotFound => true,
        notify::ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

/// Resolve `path` against the current directory without touching the
/// filesystem, so paths that do not exist yet still normalize.
pub fn absolutize(path: impl AsRef<Path>) -> Result<PathBuf, WatchError> {
    let path = path.as_ref();
    std::path::absolute(path).map_err(|e| WatchError::InvalidPath {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Watches paths and routes classified events to registered handlers.
pub struct PathWatcher {
    shared: Arc<Shared>,
    shutdown: Mutex<Option<Sender<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    event_thread: ThreadId,
    closed: AtomicBool,
}

impl PathWatcher {
    /// Create a watcher with the default retry interval.
    pub fn new() -> Result<Self, WatchError> {
        Self::with_config(WatcherConfig::default())
    }

    pub fn with_config(config: WatcherConfig) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = unbounded::<RawEvent>();
        let native = notify::recommended_watcher(move |res: RawEvent| {
            let _ = event_tx.send(res);
        })?;

        let shared = Arc::new(Shared {
            registry: HandlerRegistry::new(),
            native: Mutex::new(Some(native)),
            pending: Mutex::new(HashSet::new()),
        });

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let events = {
            let shared = shared.clone();
            let shutdown_rx = shutdown_rx.clone();
            thread::Builder::new()
                .name("tailwatch-events".to_string())
                .spawn(move || run_events(&shared, &event_rx, &shutdown_rx))
                .map_err(|e| WatchError::InitFailed {
                    reason: e.to_string(),
                })?
        };
        let event_thread = events.thread().id();

        let retry = {
            let shared = shared.clone();
            let interval = config.retry_interval;
            thread::Builder::new()
                .name("tailwatch-retry".to_string())
                .spawn(move || run_retry(&shared, &shutdown_rx, interval))
                .map_err(|e| WatchError::InitFailed {
                    reason: e.to_string(),
                })?
        };

        crate::debug_event!("watcher", "started", "retry every {:?}", config.retry_interval);

        Ok(Self {
            shared,
            shutdown: Mutex::new(Some(shutdown_tx)),
            workers: Mutex::new(vec![events, retry]),
            event_thread,
            closed: AtomicBool::new(false),
        })
    }

    /// Register `handler` for `path`.
    ///
    /// Re-registering a path is a no-op. A path that does not exist yet is
    /// parked and retried on the retry interval; that is not an error. A
    /// failed native registration rolls the handler back and is returned.
    pub fn add_watch(
        &self,
        path: impl AsRef<Path>,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), WatchError> {
        let path = absolutize(path)?;

        if !self.shared.registry.insert(path.clone(), handler) {
            crate::debug_event!("watcher", "already registered", "{}", path.display());
            return Ok(());
        }

        if let Err(e) = self.shared.register(&path) {
            self.shared.registry.remove(&path);
            return Err(e);
        }
        Ok(())
    }

    /// Drop the handler for `path`, any pending retry, and the native watch.
    ///
    /// Returns `false` if nothing was registered.
    pub fn remove_watch(&self, path: impl AsRef<Path>) -> bool {
        let path = match absolutize(path.as_ref()) {
            Ok(p) => p,
            Err(_) => path.as_ref().to_path_buf(),
        };

        let removed = self.shared.registry.remove(&path);
        self.shared.pending.lock().remove(&path);
        if removed {
            self.shared.unwatch_native(&path);
            crate::log_event!("watcher", "removed", "{}", path.display());
        }
        removed
    }

    /// Route one classified event as the event loop would.
    ///
    /// Returns `Ok(false)` when no handler matches the path or its parent.
    pub fn dispatch(&self, event: &Event) -> Result<bool, WatchError> {
        self.shared.dispatch(event)
    }

    pub fn is_registered(&self, path: impl AsRef<Path>) -> bool {
        absolutize(path)
            .map(|p| self.shared.registry.contains(&p))
            .unwrap_or(false)
    }

    pub fn registered_paths(&self) -> Vec<PathBuf> {
        self.shared.registry.paths()
    }

    /// Paths waiting to exist before they can be watched.
    pub fn pending_paths(&self) -> Vec<PathBuf> {
        self.shared.pending.lock().iter().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the native watcher and wait for the event loop to drain.
    ///
    /// Safe to call repeatedly. Calling this from a handler would join the
    /// thread that is running it, so on the event loop it only signals.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Stops the backend; no new raw events after this.
        drop(self.shared.native.lock().take());
        drop(self.shutdown.lock().take());

        if thread::current().id() == self.event_thread {
            tracing::warn!("[watcher] close called from a handler; not waiting for the event loop");
            return;
        }

        for worker in self.workers.lock().drain(..) {
            if worker.join().is_err() {
                tracing::error!("[watcher] worker thread panicked");
            }
        }
        crate::log_event!("watcher", "closed");
    }
}

impl Drop for PathWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PathWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathWatcher")
            .field("registry", &self.shared.registry)
            .field("pending", &self.pending_paths())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn run_events(shared: &Shared, events: &Receiver<RawEvent>, shutdown: &Receiver<()>) {
    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(Ok(raw)) => shared.process(raw),
                Ok(Err(e)) => tracing::warn!("[watcher] file watch error: {e}"),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                for msg in events.try_iter() {
                    match msg {
                        Ok(raw) => shared.process(raw),
                        Err(e) => tracing::warn!("[watcher] file watch error: {e}"),
                    }
                }
                break;
            }
        }
    }
    crate::debug_event!("watcher", "event loop exited");
}

fn run_retry(shared: &Shared, shutdown: &Receiver<()>, interval: Duration) {
    loop {
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => shared.reconcile(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    crate::debug_event!("watcher", "retry loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::HandlerError;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::time::Instant;
    use tempfile::TempDir;

    fn fast_watcher() -> PathWatcher {
        PathWatcher::with_config(WatcherConfig {
            retry_interval: Duration::from_millis(50),
        })
        .unwrap()
    }

    fn forwarding(tx: Sender<Event>) -> Arc<dyn EventHandler> {
        Arc::new(move |event: &Event| -> Result<(), HandlerError> {
            let _ = tx.send(event.clone());
            Ok(())
        })
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        check()
    }

    #[test]
    fn test_add_watch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let watcher = fast_watcher();
        let (first_tx, first_rx) = unbounded();
        let (second_tx, second_rx) = unbounded();

        watcher.add_watch(dir.path(), forwarding(first_tx)).unwrap();
        watcher.add_watch(dir.path(), forwarding(second_tx)).unwrap();
        assert_eq!(watcher.registered_paths().len(), 1);

        let event = Event::update(dir.path().join("a.log"));
        assert!(watcher.dispatch(&event).unwrap());
        assert_eq!(first_rx.try_recv().unwrap(), event);
        assert!(second_rx.try_recv().is_err());
    }

    #[test]
    fn test_unmatched_event_is_dropped() {
        let dir = TempDir::new().unwrap();
        let watcher = fast_watcher();
        let (tx, rx) = unbounded();
        watcher.add_watch(dir.path(), forwarding(tx)).unwrap();

        let elsewhere = Event::update("/definitely/not/watched.log");
        assert!(!watcher.dispatch(&elsewhere).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let watcher = fast_watcher();
        let failing: Arc<dyn EventHandler> =
            Arc::new(|_event: &Event| -> Result<(), HandlerError> { Err("rejected".into()) });
        watcher.add_watch(dir.path(), failing).unwrap();

        let err = watcher
            .dispatch(&Event::update(dir.path().join("a.log")))
            .unwrap_err();
        match err {
            WatchError::HandlerFailed { source, .. } => assert_eq!(source.to_string(), "rejected"),
            other => panic!("unexpected error: {other}"),
        }
        // The registration survives a failing handler.
        assert!(watcher.is_registered(dir.path()));
    }

    #[test]
    fn test_missing_path_is_deferred_then_promoted() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("later");
        let watcher = fast_watcher();
        let (tx, rx) = unbounded();

        watcher.add_watch(&target, forwarding(tx)).unwrap();
        assert!(watcher.is_registered(&target));
        assert_eq!(watcher.pending_paths(), vec![target.clone()]);

        fs::create_dir(&target).unwrap();
        assert!(wait_until(Duration::from_secs(3), || watcher.pending_paths().is_empty()));

        fs::write(target.join("app.log"), b"hello\n").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(event.path, target.join("app.log"));
    }

    #[test]
    fn test_native_events_reach_handler() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.log");
        fs::write(&file, b"").unwrap();

        let watcher = fast_watcher();
        let (tx, rx) = unbounded();
        watcher.add_watch(dir.path(), forwarding(tx)).unwrap();

        let mut handle = OpenOptions::new().append(true).open(&file).unwrap();
        handle.write_all(b"line\n").unwrap();
        handle.flush().unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut saw_update = false;
        while let Ok(event) = rx.recv_deadline(deadline) {
            if event.path == file && event.op == Op::Update {
                saw_update = true;
                break;
            }
        }
        assert!(saw_update, "expected an update for {}", file.display());
    }

    #[test]
    fn test_remove_watch_unregisters() {
        let dir = TempDir::new().unwrap();
        let watcher = fast_watcher();
        let (tx, rx) = unbounded();
        watcher.add_watch(dir.path(), forwarding(tx)).unwrap();

        assert!(watcher.remove_watch(dir.path()));
        assert!(!watcher.remove_watch(dir.path()));
        assert!(!watcher.is_registered(dir.path()));
        assert!(!watcher.dispatch(&Event::update(dir.path().join("a.log"))).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_watch_drops_pending() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("never");
        let watcher = fast_watcher();
        let (tx, _rx) = unbounded();

        watcher.add_watch(&target, forwarding(tx)).unwrap();
        assert_eq!(watcher.pending_paths().len(), 1);
        watcher.remove_watch(&target);
        assert!(watcher.pending_paths().is_empty());
    }

    #[test]
    fn test_deleted_file_root_is_rearmed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.log");
        fs::write(&file, b"").unwrap();

        let watcher = fast_watcher();
        let (tx, _rx) = unbounded();
        watcher.add_watch(&file, forwarding(tx)).unwrap();
        assert!(watcher.pending_paths().is_empty());

        fs::remove_file(&file).unwrap();
        watcher.dispatch(&Event::delete(file.clone())).unwrap();
        assert_eq!(watcher.pending_paths(), vec![file.clone()]);

        fs::write(&file, b"").unwrap();
        assert!(wait_until(Duration::from_secs(3), || watcher.pending_paths().is_empty()));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let watcher = fast_watcher();
        let (tx, _rx) = unbounded();
        watcher.add_watch(dir.path(), forwarding(tx)).unwrap();

        watcher.close();
        watcher.close();
        assert!(watcher.is_closed());
    }

    #[test]
    fn test_add_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let watcher = fast_watcher();
        watcher.close();

        let (tx, _rx) = unbounded();
        let err = watcher.add_watch(dir.path(), forwarding(tx)).unwrap_err();
        assert!(matches!(err, WatchError::PathWatchFailed { .. }));
        assert!(!watcher.is_registered(dir.path()));
    }

    #[test]
    fn test_absolutize_relative() {
        let abs = absolutize("some/relative.log").unwrap();
        assert!(abs.is_absolute());
        assert!(abs.ends_with("some/relative.log"));
    }
}
