//! Local persistence: SQLite database, snoozed item store, settings, and
//! the TOML configuration file.

mod config;
pub mod database;
pub mod item_store;
pub mod migrations;
pub mod settings;

pub use config::{BackendConfig, Config, RetryConfig, SyncConfig, WorkerConfig};
pub use database::Database;
pub use item_store::{SnoozeItemStore, SqliteItemStore};
pub use settings::{Settings, SettingsStore};

use std::path::PathBuf;

use crate::error::PersistenceError;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "snoozeai.db";

/// Returns the data directory, creating it if needed.
///
/// `SNOOZEAI_DATA_DIR` overrides the location. Otherwise the directory is
/// `~/.config/snoozeai[-dev]/`, chosen by `SNOOZEAI_ENV` (set it to `dev`
/// to use the development directory).
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, PersistenceError> {
    let dir = match std::env::var_os("SNOOZEAI_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SNOOZEAI_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("snoozeai-dev")
            } else {
                base_dir.join("snoozeai")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| PersistenceError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Path of the default database file.
pub fn default_db_path() -> Result<PathBuf, PersistenceError> {
    Ok(data_dir()?.join(DB_FILE))
}
