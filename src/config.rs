//! Controller configuration
//!
//! Loaded from JSON with every field optional, then validated once. Passed
//! around explicitly; nothing here is global.

use crate::control::LoopSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the action catalog file.
pub const CATALOG_ENV: &str = "GAME_ACTIONS_CONFIG";
pub const DEFAULT_CATALOG_PATH: &str = "config/game_actions.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Control loop rate.
    pub cycle_hz: f64,
    /// Predictions below this confidence never change the held action.
    pub confidence_threshold: f32,
    /// Stop after this many seconds; run until cancelled when absent.
    pub duration_secs: Option<f64>,
    /// Hold time per action in scripted sequences.
    pub hold_ms: u64,
    /// Pause between actions in scripted sequences.
    pub sequence_gap_ms: u64,
    /// Log loop statistics every N cycles.
    pub stats_every: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cycle_hz: 10.0,
            confidence_threshold: 0.5,
            duration_secs: None,
            hold_ms: 100,
            sequence_gap_ms: 50,
            stats_every: 100,
        }
    }
}

impl ControllerConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded controller config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.cycle_hz.is_finite() && self.cycle_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cycle_hz must be positive, got {}",
                self.cycle_hz
            )));
        }
        if Duration::try_from_secs_f64(1.0 / self.cycle_hz).is_err() {
            return Err(ConfigError::Invalid(format!(
                "cycle_hz {} gives a period too long to schedule",
                self.cycle_hz
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if let Some(secs) = self.duration_secs {
            if !(secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()) {
                return Err(ConfigError::Invalid(format!(
                    "duration_secs must be positive and representable, got {}",
                    secs
                )));
            }
        }
        Ok(())
    }

    /// Replay sends the frames before its first action with zero confidence,
    /// so the gate has to reject zero.
    pub fn validate_for_replay(&self) -> ConfigResult<()> {
        self.validate()?;
        if self.confidence_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "replay needs confidence_threshold above 0, got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.cycle_hz)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn sequence_gap(&self) -> Duration {
        Duration::from_millis(self.sequence_gap_ms)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            period: self.period(),
            duration_limit: self.duration_secs.map(Duration::from_secs_f64),
            max_cycles: None,
            stats_every: self.stats_every,
        }
    }
}

/// Catalog location: explicit path, else `$GAME_ACTIONS_CONFIG`, else
/// `config/game_actions.json`.
pub fn resolve_catalog_path(explicit: Option<&Path>) -> PathBuf {
    resolve_catalog_path_with(explicit, std::env::var_os(CATALOG_ENV).map(PathBuf::from))
}

fn resolve_catalog_path_with(explicit: Option<&Path>, from_env: Option<PathBuf>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or(from_env.filter(|path| !path.as_os_str().is_empty()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH))
}
