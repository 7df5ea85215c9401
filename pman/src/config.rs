//! pman configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;

const DEFAULT_CONFIG_PATH: &str = "/etc/pman/config.toml";

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct PmanConfig {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    /// Mount point of the per-process pseudo-filesystem
    #[serde(default = "default_proc_root")]
    pub proc_root: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            proc_root: default_proc_root(),
        }
    }
}

fn default_prompt() -> String { "PMan: > ".into() }
fn default_log_level() -> String { "warn".into() }
fn default_proc_root() -> String { "/proc".into() }

/// Config file location: `$PMAN_CONFIG`, or /etc/pman/config.toml
pub fn config_path() -> String {
    std::env::var("PMAN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// Load configuration from `path`. Returns `None` if there is no such file.
///
/// Runs before logging is set up, so it reports nothing itself.
pub fn load_config(path: &str) -> Result<Option<PmanConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read config from {path}")),
    };
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {path}"))?;
    Ok(Some(config))
}
