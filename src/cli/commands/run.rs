//! Run command - observe every configured path until interrupted.

use anyhow::{Context, bail};
use crossbeam_channel::bounded;

use crate::config::Settings;
use crate::monitor::Monitor;

/// Block the calling thread until Ctrl+C (or SIGTERM) arrives.
pub fn wait_for_interrupt() -> anyhow::Result<()> {
    let (tx, rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .context("cannot install Ctrl+C handler")?;

    let _ = rx.recv();
    Ok(())
}

/// Observe every `[[observe]]` entry, then wait for Ctrl+C.
pub fn run(settings: &Settings) -> anyhow::Result<()> {
    if settings.observe.is_empty() {
        bail!("no [[observe]] entries configured; run `tailwatch init` and edit the settings file");
    }

    let monitor = Monitor::with_config(settings.watcher.to_config())
        .context("cannot start file watcher")?;

    for entry in &settings.observe {
        let options = entry
            .to_options()
            .with_context(|| format!("invalid [[observe]] entry for {}", entry.path.display()))?;
        monitor
            .observe(&entry.path, options)
            .with_context(|| format!("cannot observe {}", entry.path.display()))?;
        crate::log_event!("run", "observing", "{}", entry.path.display());
    }

    eprintln!(
        "Observing {} path(s). Press Ctrl+C to stop.",
        settings.observe.len()
    );

    wait_for_interrupt()?;

    eprintln!("Stopping...");
    monitor.close();
    Ok(())
}
