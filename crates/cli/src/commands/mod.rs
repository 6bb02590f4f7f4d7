pub mod chat;
pub mod doctor;
pub mod init;
pub mod serve;

use std::path::{Path, PathBuf};
use tailortalk_config::AppConfig;

/// The config file to use: the `--config` path or the default location.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load configuration with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path)
        .map_err(|e| format!("Failed to load config from {}: {e}", path.display()).into())
}
