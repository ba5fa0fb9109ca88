//! Tail command - ad-hoc observation from command-line flags.

use anyhow::Context;

use crate::cli::args::TailArgs;
use crate::config::{ObserveConfig, RateLimitConfig, SenderConfig, Settings};
use crate::monitor::Monitor;

use super::run::wait_for_interrupt;

/// Translate the flags into `[[observe]]` entries so both paths share one
/// construction route.
pub fn observe_entries(args: &TailArgs) -> Vec<ObserveConfig> {
    let mut senders = Vec::new();
    if !args.quiet {
        senders.push(SenderConfig::Stdout);
    }
    if let Some(url) = &args.webhook {
        senders.push(SenderConfig::Webhook {
            url: url.clone(),
            format: args.format,
        });
    }

    let rate_limit = match (args.rate_window_ms, args.rate_count) {
        (Some(window_ms), Some(count)) => Some(RateLimitConfig { window_ms, count }),
        _ => None,
    };

    args.paths
        .iter()
        .map(|path| ObserveConfig {
            path: path.clone(),
            exclude: args.exclude.clone(),
            rate_limit,
            senders: senders.clone(),
        })
        .collect()
}

pub fn run(args: &TailArgs, settings: &Settings) -> anyhow::Result<()> {
    let monitor = Monitor::with_config(settings.watcher.to_config())
        .context("cannot start file watcher")?;

    // One filter chain per path: each root gets its own rate limit budget.
    for entry in observe_entries(args) {
        let options = entry.to_options()?;
        monitor
            .observe(&entry.path, options)
            .with_context(|| format!("cannot observe {}", entry.path.display()))?;
        crate::debug_event!("tail", "observing", "{}", entry.path.display());
    }

    wait_for_interrupt()?;
    monitor.close();
    Ok(())
}
