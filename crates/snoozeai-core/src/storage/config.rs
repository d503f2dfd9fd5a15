//! TOML-based application configuration.
//!
//! Stores deployment settings that are not user preferences:
//! - Backend endpoint, request timeout and summary length
//! - Retry budget for backend calls
//! - Reconciliation page size
//! - Resurface worker polling and budgets
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;

/// Backend endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout; a timeout is retried like any other failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

/// Backend retry budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each subsequent one.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

/// Reconciliation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

/// Resurface worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum tasks fired per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Wall-clock budget for one pass.
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
    #[serde(default = "default_max_fire_attempts")]
    pub max_fire_attempts: u32,
    /// How long a claimed task may stay in flight before it is re-queued.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    /// How long delivered, cancelled, superseded and failed tasks are kept.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_summary_max_tokens() -> u32 {
    80
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_page_limit() -> u32 {
    50
}
fn default_poll_interval_secs() -> u64 {
    15
}
fn default_batch_size() -> u32 {
    32
}
fn default_budget_secs() -> u64 {
    25
}
fn default_max_fire_attempts() -> u32 {
    3
}
fn default_lease_secs() -> u64 {
    300
}
fn default_retention_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// Upper bound for second-based worker windows (ten years).
const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn window(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            budget_secs: default_budget_secs(),
            max_fire_attempts: default_max_fire_attempts(),
            lease_secs: default_lease_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    pub fn lease(&self) -> chrono::Duration {
        window(self.lease_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        window(self.retention_secs)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as a non-negative integer")))?,
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the configuration file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::DataDir(e.to_string()))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// All leaf keys with their values, in dot-path form.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) {
            for (section, fields) in sections {
                if let serde_json::Value::Object(fields) = fields {
                    for (field, value) in fields {
                        let rendered = match value {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        out.push((format!("{section}.{field}"), rendered));
                    }
                }
            }
        }
        out.sort();
        out
    }

    /// Set a config value by key in memory. Call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if url::Url::parse(&self.backend.base_url).is_err() {
            return Err(invalid("backend.base_url", "not an absolute URL"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(invalid("backend.timeout_secs", "must be greater than zero"));
        }
        if self.sync.page_limit == 0 {
            return Err(invalid("sync.page_limit", "must be greater than zero"));
        }
        if self.worker.batch_size == 0 {
            return Err(invalid("worker.batch_size", "must be greater than zero"));
        }
        if self.worker.max_fire_attempts == 0 {
            return Err(invalid("worker.max_fire_attempts", "must be greater than zero"));
        }
        if self.worker.lease_secs > MAX_WINDOW_SECS {
            return Err(invalid("worker.lease_secs", "must be at most ten years"));
        }
        if self.worker.retention_secs > MAX_WINDOW_SECS {
            return Err(invalid("worker.retention_secs", "must be at most ten years"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.backend.base_url, "http://localhost:8000");
        assert_eq!(cfg.backend.timeout_secs, 10);
        assert_eq!(cfg.backend.summary_max_tokens, 80);
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.retry.initial_delay(), Duration::from_millis(500));
        assert_eq!(cfg.sync.page_limit, 50);
        assert_eq!(cfg.worker.batch_size, 32);
        assert_eq!(cfg.worker.lease(), chrono::Duration::seconds(300));
        assert_eq!(cfg.worker.retention(), chrono::Duration::days(7));
    }

    #[test]
    fn worker_windows_are_bounded() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("worker.retention_secs", &u64::MAX.to_string()),
            Err(ConfigError::InvalidValue { .. })
        ));
        cfg.set("worker.retention_secs", "3600").unwrap();
        assert_eq!(cfg.worker.retention(), chrono::Duration::hours(1));

        let huge = WorkerConfig {
            lease_secs: u64::MAX,
            ..WorkerConfig::default()
        };
        assert_eq!(huge.lease(), chrono::Duration::seconds(MAX_WINDOW_SECS as i64));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: Config = toml::from_str("[backend]\nbase_url = \"https://api.example.com\"\n").unwrap();
        assert_eq!(parsed.backend.base_url, "https://api.example.com");
        assert_eq!(parsed.backend.timeout_secs, 10);
        assert_eq!(parsed.worker, WorkerConfig::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("retry.max_retries").as_deref(), Some("2"));
        assert_eq!(cfg.get("backend.base_url").as_deref(), Some("http://localhost:8000"));
        assert!(cfg.get("backend").is_none());
        assert!(cfg.get("backend.missing_key").is_none());
    }

    #[test]
    fn set_updates_numbers_and_strings() {
        let mut cfg = Config::default();
        cfg.set("sync.page_limit", "20").unwrap();
        cfg.set("backend.base_url", "https://triage.example.com").unwrap();
        assert_eq!(cfg.sync.page_limit, 20);
        assert_eq!(cfg.backend.base_url, "https://triage.example.com");
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.set("worker.nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            cfg.set("retry.max_retries", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("worker.batch_size", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set("backend.base_url", "not a url"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn entries_lists_every_leaf() {
        let entries = Config::default().entries();
        assert!(entries.contains(&("worker.lease_secs".to_string(), "300".to_string())));
        assert!(entries.contains(&("worker.retention_secs".to_string(), "604800".to_string())));
        assert_eq!(entries.len(), 12);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        std::fs::write(&path, "[retry]\nmax_retries = 5\n").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().retry.max_retries, 5);

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }
}
