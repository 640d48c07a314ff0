//! Instance and logging configuration.
//!
//! # Invariants
//! - Every field has a default; partial JSON documents are accepted.
//! - `update_target` must be non-empty.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Broadcast target of the update emitter unless configured otherwise.
pub const DEFAULT_UPDATE_TARGET: &str = "---update";

/// Construction options for a parameter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Generate a random namespace prefix when none can be recovered.
    pub unique: bool,
    /// Broadcast target used by the update emitter.
    pub update_target: String,
    pub layout: LayoutConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            unique: false,
            update_target: DEFAULT_UPDATE_TARGET.to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl SyncOptions {
    /// Default options with namespace generation turned on.
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    /// Parses options from a JSON document; missing fields take defaults.
    pub fn from_json_str(text: &str) -> SyncResult<Self> {
        let options: Self = serde_json::from_str(text)
            .map_err(|err| SyncError::configuration(format!("invalid sync options: {err}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.update_target.trim().is_empty() {
            return Err(SyncError::configuration("update_target cannot be empty"));
        }
        Ok(())
    }
}

/// Cosmetic placement of generated nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub origin_x: i32,
    pub origin_y: i32,
    /// Horizontal distance between two parameter chains.
    pub column_width: i32,
    /// Vertical distance between two links of one chain.
    pub row_height: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 50,
            origin_y: 100,
            column_width: 150,
            row_height: 100,
        }
    }
}

/// Rolling file logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of `trace|debug|info|warn|error`, case-insensitive.
    pub level: String,
    /// Absolute directory receiving rolling log files.
    pub log_dir: PathBuf,
}

impl LogConfig {
    pub fn new(level: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
        }
    }
}
