// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Settings for blockseq.
//!
//! Settings are read-only to the core. They load from YAML or TOML,
//! chosen by file extension, and every field has a default so a partial
//! file is valid.

pub mod watcher;

pub use watcher::{validate_settings, SettingsEvent, SettingsWatcher};

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::governor::GovernorConfig;
use crate::host::DEFAULT_LANGUAGE;
use crate::timing::{bpm_to_cps, MAX_BPM, MIN_BPM};

/// Root settings document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    /// Evaluation behavior
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    /// Write-back debounce
    #[serde(default)]
    pub sync: SyncSettings,
    /// Resource governor tuning
    #[serde(default)]
    pub resources: ResourceSettings,
    /// Block discovery
    #[serde(default)]
    pub blocks: BlockSettings,
}

impl Settings {
    /// Load settings from a YAML or TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read settings file: {:?}", path))?;

        let settings = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&contents)?,
            _ => Self::from_yaml(&contents)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file means all defaults
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML settings")
    }

    /// Parse settings from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML settings")
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize settings to YAML")
    }

    /// Save settings to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))
    }

    /// Reject values the core cannot work with
    pub fn validate(&self) -> Result<()> {
        let tempo = self.evaluation.default_tempo;
        if !(MIN_BPM..=MAX_BPM).contains(&tempo) {
            bail!("default_tempo {} is outside {}..={} BPM", tempo, MIN_BPM, MAX_BPM);
        }
        if self.sync.typing_settle_ms == 0 {
            bail!("typing_settle_ms must be greater than zero");
        }
        if self.resources.cleanup_interval_secs == 0 {
            bail!("cleanup_interval_secs must be greater than zero");
        }
        if self.blocks.language.trim().is_empty() {
            bail!("block language must not be empty");
        }
        Ok(())
    }

    /// Default tempo in cycles per second
    pub fn default_cps(&self) -> f64 {
        bpm_to_cps(self.evaluation.default_tempo)
    }

    /// Debounce before a playing block is re-evaluated
    pub fn auto_evaluate_delay(&self) -> Duration {
        Duration::from_millis(self.evaluation.auto_evaluate_delay_ms)
    }

    /// Delay before an edit proposes a write
    pub fn propose_write_delay(&self) -> Duration {
        Duration::from_millis(self.sync.propose_write_ms)
    }

    /// Quiet period after which typing is considered finished
    pub fn typing_settle_delay(&self) -> Duration {
        Duration::from_millis(self.sync.typing_settle_ms)
    }

    /// Governor tuning derived from the resource section
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            cleanup_interval: Duration::from_secs(self.resources.cleanup_interval_secs),
            memory_threshold: self.resources.memory_threshold_kb * 1024,
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSettings {
    /// Re-evaluate playing blocks while they are edited
    #[serde(default = "default_auto_evaluate")]
    pub auto_evaluate_enabled: bool,
    /// Debounce for auto-evaluation in milliseconds
    #[serde(default = "default_auto_evaluate_delay")]
    pub auto_evaluate_delay_ms: u64,
    /// Tempo in BPM for newly started patterns
    #[serde(default = "default_tempo")]
    pub default_tempo: f64,
}

fn default_auto_evaluate() -> bool {
    true
}
fn default_auto_evaluate_delay() -> u64 {
    450
}
fn default_tempo() -> f64 {
    120.0
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            auto_evaluate_enabled: default_auto_evaluate(),
            auto_evaluate_delay_ms: default_auto_evaluate_delay(),
            default_tempo: default_tempo(),
        }
    }
}

/// Write-back settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    /// Delay before an edit proposes a write
    #[serde(default = "default_propose_write")]
    pub propose_write_ms: u64,
    /// Quiet period that ends typing
    #[serde(default = "default_typing_settle")]
    pub typing_settle_ms: u64,
}

fn default_propose_write() -> u64 {
    200
}
fn default_typing_settle() -> u64 {
    1500
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            propose_write_ms: default_propose_write(),
            typing_settle_ms: default_typing_settle(),
        }
    }
}

/// Resource governor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSettings {
    /// Seconds between cleanup passes
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Advisory memory threshold in KB
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold_kb: usize,
}

fn default_cleanup_interval() -> u64 {
    30
}
fn default_memory_threshold() -> usize {
    50
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: default_cleanup_interval(),
            memory_threshold_kb: default_memory_threshold(),
        }
    }
}

/// Block discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockSettings {
    /// Fence language tag marking pattern blocks
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}
