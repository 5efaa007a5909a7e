use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::config::loader::file_to_settings;
use crate::config::loader::parse_settings;
use crate::config::settings::Settings;

/// Settings from `config_path`, or the defaults when the file does not exist.
pub async fn run(config_path: &str) -> Result<Settings> {
    let path = Path::new(config_path);
    if !path.exists() {
        info!("settings file {} not found, using defaults", config_path);
        return parse_settings("").await;
    }
    file_to_settings(path)
        .await
        .map_err(|e| anyhow!("Invalid config format: {}", e))
}
