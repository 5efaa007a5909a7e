use std::path::Path;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::{debug, error};

use crate::config::settings::{LoggingConfig, Settings};
use crate::observability::metrics::get_metrics;

/// Load settings from a YAML file, expanding `${VAR}` / `${VAR:default}` first.
pub async fn file_to_settings(path: &Path) -> Result<Settings> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read settings file {}", path.display()))?;
    let expanded = expand_env_vars(&content)?;
    parse_settings(&expanded).await
}

pub async fn parse_settings(content: &str) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(with_defaults(Settings::default()));
    }

    let metrics = get_metrics().await;
    let settings: Settings = serde_yaml::from_str(content).inspect_err(|e| {
        error!("parse settings error: {}", e);
        metrics.config_errors.inc();
    })?;

    debug!("settings parsed");
    Ok(with_defaults(settings))
}

fn with_defaults(mut settings: Settings) -> Settings {
    if settings.logging.is_none() {
        settings.logging = Some(LoggingConfig::default());
    }
    settings
}

pub fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    Ok(re
        .replace_all(input, |caps: &Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}
