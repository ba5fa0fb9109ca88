use std::env;
use std::time::Duration;
use tailwatch::Settings;
use tempfile::TempDir;

#[test]
fn test_env_override_with_double_underscore() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        "[watcher]\nretry_interval_ms = 500\n\n[logging]\ndefault = \"info\"\n",
    )
    .unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("TAILWATCH_WATCHER__RETRY_INTERVAL_MS", "75");
        env::set_var("TAILWATCH_LOGGING__DEFAULT", "debug");
    }

    let settings = Settings::load_from(&config_path);

    unsafe {
        env::remove_var("TAILWATCH_WATCHER__RETRY_INTERVAL_MS");
        env::remove_var("TAILWATCH_LOGGING__DEFAULT");
    }

    let settings = settings.unwrap();
    assert_eq!(settings.watcher.retry_interval_ms, 75);
    assert_eq!(settings.logging.default, "debug");
    assert_eq!(
        settings.watcher.to_config().retry_interval,
        Duration::from_millis(75)
    );
}
