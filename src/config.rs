//! Configuration loader
//!
//! Loads project configuration from YAML and applies `PROJIO_*`
//! environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::datestamp::DatestampPlacement;
use crate::project::ProjectSettings;

/// Names a YAML file loaded by [`ProjectConfig::from_env`]
pub const CONFIG_ENV: &str = "PROJIO_CONFIG";

/// Project roots and settings as written in a config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub root: Option<PathBuf>,
    pub inputs: Option<PathBuf>,
    pub outputs: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    #[serde(flatten)]
    pub settings: ProjectSettings,
}

impl ProjectConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse project configuration")
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading project configuration from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `PROJIO_CONFIG` (if set) and apply `PROJIO_*` overrides
    pub fn from_env() -> Result<Self> {
        let config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::load(path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`; empty values are ignored
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(root) = get("PROJIO_ROOT") {
            self.root = Some(PathBuf::from(root));
        }
        if let Some(inputs) = get("PROJIO_INPUTS") {
            self.inputs = Some(PathBuf::from(inputs));
        }
        if let Some(outputs) = get("PROJIO_OUTPUTS") {
            self.outputs = Some(PathBuf::from(outputs));
        }
        if let Some(cache) = get("PROJIO_CACHE") {
            self.cache = Some(PathBuf::from(cache));
        }

        if let Some(value) = get("PROJIO_USE_DATESTAMP") {
            self.settings.use_datestamp = parse_bool("PROJIO_USE_DATESTAMP", &value)?;
        }
        if let Some(value) = get("PROJIO_DATESTAMP_FORMAT") {
            self.settings.datestamp_format = value;
        }
        if let Some(value) = get("PROJIO_DATESTAMP_IN") {
            self.settings.datestamp_in = value
                .parse::<DatestampPlacement>()
                .map_err(|e| anyhow!("PROJIO_DATESTAMP_IN: {}", e))?;
        }
        if let Some(value) = get("PROJIO_AUTO_CREATE") {
            self.settings.auto_create = parse_bool("PROJIO_AUTO_CREATE", &value)?;
        }
        if let Some(value) = get("PROJIO_DRY_RUN") {
            self.settings.dry_run = parse_bool("PROJIO_DRY_RUN", &value)?;
        }

        Ok(self)
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{}: expected a boolean, got '{}'", var, value)),
    }
}
