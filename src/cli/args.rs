//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::sender::WebhookFormat;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "tailwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Tail log files and ship new lines",
    long_about = "Watch files and directories, tail appended lines, filter them and forward the survivors.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize configuration
    #[command(about = "Set up .tailwatch directory with a starter configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Observe every [[observe]] entry from the settings file
    #[command(
        about = "Run the configured observers until Ctrl+C",
        after_help = "Examples:\n  tailwatch run\n  tailwatch run --config /etc/tailwatch/settings.toml"
    )]
    Run,

    /// Ad-hoc tailing without a settings file
    #[command(
        about = "Tail paths and print new lines",
        after_help = "Examples:\n  tailwatch tail /var/log/app\n  tailwatch tail app.log --exclude 'DEBUG|TRACE'\n  tailwatch tail /var/log/app --rate-window-ms 60000 --rate-count 30 \\\n      --webhook https://hooks.example.com/T000 --format wecom"
    )]
    Tail(TailArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct TailArgs {
    /// Files or directories to observe
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Drop lines containing any of these `|`-separated substrings
    #[arg(short, long)]
    pub exclude: Option<String>,

    /// Rate limit window in milliseconds
    #[arg(long, requires = "rate_count")]
    pub rate_window_ms: Option<u64>,

    /// Lines allowed per rate limit window
    #[arg(long, requires = "rate_window_ms")]
    pub rate_count: Option<u32>,

    /// Also post each line to this webhook URL
    #[arg(long)]
    pub webhook: Option<String>,

    /// Webhook payload format
    #[arg(long, value_enum, default_value_t = WebhookFormat::Plain, requires = "webhook")]
    pub format: WebhookFormat,

    /// Do not print lines to stdout (requires --webhook)
    #[arg(long, requires = "webhook")]
    pub quiet: bool,
}
