//! Monitor behavior through its public API.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use tailwatch::{
    ChannelSender, Event, KeywordFilter, Monitor, MonitorError, ObserveOptions, WatchError,
    WatcherConfig,
};
use tempfile::TempDir;

fn fast_monitor() -> Monitor {
    Monitor::with_config(WatcherConfig {
        retry_interval: Duration::from_millis(50),
    })
    .unwrap()
}

fn channel_options() -> (ObserveOptions, Receiver<String>) {
    let (tx, rx) = unbounded();
    (ObserveOptions::new().sender(ChannelSender::new(tx)), rx)
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).create(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.sync_all().unwrap();
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
fn test_observe_without_senders_registers_nothing() {
    let dir = TempDir::new().unwrap();
    let monitor = fast_monitor();

    let err = monitor.observe(dir.path(), ObserveOptions::new()).unwrap_err();
    assert!(matches!(err, MonitorError::NoSenders { .. }));
    assert!(!monitor.is_observed(dir.path()));
    assert!(!monitor.watcher().is_registered(dir.path()));
}

#[test]
fn test_second_observe_keeps_first_options() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (first, first_rx) = channel_options();
    let (second, second_rx) = channel_options();
    monitor.observe(dir.path(), first).unwrap();
    monitor.observe(dir.path(), second).unwrap();
    assert_eq!(monitor.observed_roots().len(), 1);

    assert!(monitor.dispatch(&Event::create(&log)).unwrap());
    append(&log, "hello\n");
    assert!(monitor.dispatch(&Event::update(&log)).unwrap());

    assert_eq!(first_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "hello");
    assert!(second_rx.try_recv().is_err());
    assert_eq!(monitor.tailer_count(), 1);
}

#[test]
fn test_preexisting_content_is_not_shipped() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "old line\n").unwrap();

    let monitor = fast_monitor();
    let (options, rx) = channel_options();
    monitor.observe(&log, options).unwrap();

    monitor.dispatch(&Event::update(&log)).unwrap();
    assert!(rx.try_recv().is_err());

    append(&log, "new line\n");
    monitor.dispatch(&Event::update(&log)).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "new line");
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_unobserve_closes_tailers() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (options, _rx) = channel_options();
    monitor.observe(dir.path(), options).unwrap();
    monitor.dispatch(&Event::create(&log)).unwrap();
    assert_eq!(monitor.tailer_count(), 1);

    let tailer = monitor.tailer(&log).unwrap();
    assert_eq!(monitor.unobserve(dir.path()), 1);
    assert!(tailer.lock().is_closed());
    assert_eq!(monitor.tailer_count(), 0);
    assert!(!monitor.is_observed(dir.path()));

    // No handler left to receive it
    assert!(!monitor.dispatch(&Event::update(&log)).unwrap());
    assert_eq!(monitor.unobserve(dir.path()), 0);
}

#[test]
fn test_intercept_rejection_stops_processing() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (options, _rx) = channel_options();
    let options = options.intercept(|_event: &Event| Err("not today".into()));
    monitor.observe(dir.path(), options).unwrap();

    let err = monitor.dispatch(&Event::create(&log)).unwrap_err();
    match err {
        WatchError::HandlerFailed { source, .. } => {
            let inner = source.downcast_ref::<MonitorError>().unwrap();
            assert!(matches!(inner, MonitorError::Intercepted { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(monitor.tailer_count(), 0);
}

#[test]
fn test_delete_retires_tailer_and_recreate_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (options, rx) = channel_options();
    monitor.observe(dir.path(), options).unwrap();

    monitor.dispatch(&Event::create(&log)).unwrap();
    let first = monitor.tailer(&log).unwrap();

    fs::remove_file(&log).unwrap();
    monitor.dispatch(&Event::delete(&log)).unwrap();
    assert!(first.lock().is_closed());
    assert!(monitor.tailer(&log).is_none());

    // Let the backend's own delete notification drain before recreating.
    thread::sleep(Duration::from_millis(300));

    fs::write(&log, "").unwrap();
    monitor.dispatch(&Event::create(&log)).unwrap();
    let second = monitor.tailer(&log).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&first, &second));

    append(&log, "again\n");
    monitor.dispatch(&Event::update(&log)).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "again");
}

#[test]
fn test_delete_of_untailed_file_is_ignored() {
    let dir = TempDir::new().unwrap();
    let monitor = fast_monitor();
    let (options, _rx) = channel_options();
    monitor.observe(dir.path(), options).unwrap();

    let ghost = dir.path().join("ghost.log");
    assert!(monitor.dispatch(&Event::delete(&ghost)).unwrap());
    assert_eq!(monitor.tailer_count(), 0);
}

#[test]
fn test_native_events_ship_filtered_lines() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (options, rx) = channel_options();
    monitor
        .observe(&log, options.filter(KeywordFilter::new("DEBUG")))
        .unwrap();

    // Open the tailer at offset 0 before anything is written.
    monitor.dispatch(&Event::create(&log)).unwrap();

    append(&log, "DEBUG noisy\nERROR boom\n");

    let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(line, "ERROR boom");

    thread::sleep(Duration::from_millis(200));
    assert!(rx.try_recv().is_err());
    monitor.close();
}

#[test]
fn test_directory_root_ships_lines_from_native_events() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");

    let monitor = fast_monitor();
    let (options, rx) = channel_options();
    monitor
        .observe(dir.path(), options.filter(KeywordFilter::new("DEBUG")))
        .unwrap();

    // The create notification alone materializes the tailer at offset 0.
    fs::write(&log, "").unwrap();
    assert!(wait_until(Duration::from_secs(5), || monitor.tailer(&log).is_some()));

    append(&log, "DEBUG noisy\nERROR boom\n");

    let line = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(line, "ERROR boom");

    thread::sleep(Duration::from_millis(200));
    assert!(rx.try_recv().is_err());
    assert_eq!(monitor.tailer_count(), 1);
    monitor.close();
}

#[test]
fn test_copy_truncate_rotation_keeps_shipping() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (options, rx) = channel_options();
    monitor.observe(dir.path(), options).unwrap();
    monitor.dispatch(&Event::create(&log)).unwrap();

    append(&log, "before rotate\n");
    monitor.dispatch(&Event::update(&log)).unwrap();

    OpenOptions::new().write(true).open(&log).unwrap().set_len(0).unwrap();
    monitor.dispatch(&Event::update(&log)).unwrap();

    append(&log, "first after rotate\n");
    monitor.dispatch(&Event::update(&log)).unwrap();
    append(&log, "second after rotate\n");
    monitor.dispatch(&Event::update(&log)).unwrap();

    let mut delivered = Vec::new();
    while delivered.len() < 3 {
        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(line) => delivered.push(line),
            Err(_) => break,
        }
    }
    assert_eq!(
        delivered,
        vec!["before rotate", "first after rotate", "second after rotate"]
    );
    assert!(rx.try_recv().is_err());
    monitor.close();
}

#[test]
fn test_missing_root_is_picked_up_once_created() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("later.log");

    let monitor = fast_monitor();
    let (options, rx) = channel_options();
    monitor.observe(&log, options).unwrap();
    assert!(monitor.is_observed(&log));
    assert_eq!(monitor.watcher().pending_paths().len(), 1);

    fs::write(&log, "").unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        monitor.watcher().pending_paths().is_empty()
    }));

    monitor.dispatch(&Event::create(&log)).unwrap();
    append(&log, "arrived\n");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "arrived");
    monitor.close();
}

#[test]
fn test_close_releases_everything() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "").unwrap();

    let monitor = fast_monitor();
    let (options, _rx) = channel_options();
    monitor.observe(dir.path(), options).unwrap();
    monitor.dispatch(&Event::create(&log)).unwrap();

    let tailer = monitor.tailer(&log).unwrap();
    monitor.close();
    monitor.close();

    assert!(tailer.lock().is_closed());
    assert_eq!(monitor.tailer_count(), 0);
    assert!(monitor.watcher().is_closed());
}
