use clap::Parser;
use tailwatch::Settings;
use tailwatch::cli::commands;
use tailwatch::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        tailwatch::logging::init();
        return commands::init::run_init(force);
    }

    // An explicit --config must load; the discovered one falls back to defaults
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration for now.");
            Settings::default()
        }),
    };

    tailwatch::logging::init_with_config(&settings.logging);

    match &cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Run => commands::run::run(&settings),
        Commands::Tail(args) => commands::tail::run(args, &settings),
    }
}
