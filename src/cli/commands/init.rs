//! Init and Config commands.

use anyhow::Context;

use crate::config::Settings;

/// Run init command - create configuration file in the current directory.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let path = Settings::init_config_file(&cwd, force)?;

    println!("Created configuration file at: {}", path.display());
    println!("Add [[observe]] entries, then start with `tailwatch run`.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    let toml_str = toml::to_string_pretty(config).context("cannot render settings")?;
    println!("{toml_str}");
    Ok(())
}
