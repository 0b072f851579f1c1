use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process configuration, loaded from `~/.tomato/config.toml` with
/// environment-variable overrides (`TOMATO_*`), falling back to built-in
/// defaults when neither is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load config from `~/.tomato/config.toml`, falling back to defaults
    /// when the file does not exist, then apply `TOMATO_*` environment
    /// overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut cfg = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load from a specific path, with no environment overrides applied.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_u64("TOMATO_TIMEOUT_INITIAL") {
            self.timeouts.initial_secs = v;
        }
        if let Some(v) = env_u64("TOMATO_TIMEOUT_WARNING") {
            self.timeouts.warning_secs = v;
        }
        if let Some(v) = env_u64("TOMATO_TIMEOUT_MAX") {
            self.timeouts.max_secs = v;
        }
        if let Some(v) = env_u64("TOMATO_REAPER_INTERVAL") {
            self.scheduler.reaper_interval_secs = v;
        }
        if let Some(v) = env_u64("TOMATO_SAMPLER_INTERVAL") {
            self.scheduler.sampler_interval_secs = v;
        }
        if let Ok(v) = std::env::var("TOMATO_DB_PATH") {
            self.storage.db_path = v;
        }
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tomato")
            .join("config.toml")
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// TimeoutConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_initial")]
    pub initial_secs: u64,
    #[serde(default = "default_warning")]
    pub warning_secs: u64,
    #[serde(default = "default_max")]
    pub max_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            initial_secs: default_initial(),
            warning_secs: default_warning(),
            max_secs: default_max(),
        }
    }
}

fn default_initial() -> u64 {
    3600
}
fn default_warning() -> u64 {
    1800
}
fn default_max() -> u64 {
    3600 * 24 * 7
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
    #[serde(default = "default_sampler_interval")]
    pub sampler_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reaper_interval_secs: default_reaper_interval(),
            sampler_interval_secs: default_sampler_interval(),
        }
    }
}

fn default_reaper_interval() -> u64 {
    600
}
fn default_sampler_interval() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "tomato.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.timeouts.initial_secs, 3600);
        assert_eq!(cfg.timeouts.warning_secs, 1800);
        assert_eq!(cfg.scheduler.reaper_interval_secs, 600);
        assert_eq!(cfg.scheduler.sampler_interval_secs, 60);
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[timeouts]\ninitial_secs = 120\nwarning_secs = 30\nmax_secs = 600\n",
        )
        .unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.timeouts.initial_secs, 120);
        assert_eq!(cfg.timeouts.warning_secs, 30);
        assert_eq!(cfg.timeouts.max_secs, 600);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let text = cfg.to_toml().unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.timeouts.initial_secs, cfg.timeouts.initial_secs);
    }
}
