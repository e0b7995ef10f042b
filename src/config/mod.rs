//! Configuration management for Wayroute
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It covers the dispatcher worker, input routing
//! constants and surface id allocation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration struct containing all Wayroute settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WayrouteConfig {
    /// Readiness loop and worker thread settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Input routing settings
    #[serde(default)]
    pub input: InputConfig,

    /// Surface id allocation
    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// Readiness loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum readiness events collected per wait
    pub max_events: usize,

    /// Nice value applied to the worker thread (0-19)
    pub worker_nice: i32,

    /// Name of the worker thread
    pub thread_name: String,
}

/// Input routing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Scroll offset reported for one wheel step
    pub scroll_step: i32,

    /// Distance between the touch-point id ranges of successive touch devices
    pub touch_id_stride: u32,
}

/// Surface id allocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Ids are handed out starting after this value
    pub id_base: u32,

    /// Environment variable that overrides the next id
    pub id_env_override: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_events: 16,
            worker_nice: 10,
            thread_name: "wayland-dispatcher".to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            scroll_step: 120,
            touch_id_stride: 100,
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            id_base: 7000,
            id_env_override: "WAYROUTE_SURFACE_ID".to_string(),
        }
    }
}

impl WayrouteConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: WayrouteConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.max_events == 0 || self.dispatcher.max_events > 1024 {
            anyhow::bail!("Invalid max_events: must be between 1 and 1024");
        }

        if !(0..=19).contains(&self.dispatcher.worker_nice) {
            anyhow::bail!("Invalid worker_nice: must be between 0 and 19");
        }

        if self.dispatcher.thread_name.is_empty() {
            anyhow::bail!("Invalid thread_name: must not be empty");
        }

        if self.input.scroll_step <= 0 {
            anyhow::bail!("Invalid scroll_step: must be positive");
        }

        if self.input.touch_id_stride == 0 {
            anyhow::bail!("Invalid touch_id_stride: must be positive");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}


#[cfg(test)]
mod property_tests;
