//! Core error types for snoozeai-core.
//!
//! Every component converts the failures of its collaborators (network,
//! SQLite, filesystem) into this taxonomy at its own boundary, so callers
//! only ever match on these enums.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for snoozeai-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backend call failed after the retry budget was spent
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Input rejected before any side effect
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local storage failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Deferred task could not be registered
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconciliation failure
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// No snoozed item with this id
    #[error("Snoozed item not found: {0}")]
    NotFound(String),
}

/// A backend operation that kept failing until the retry budget ran out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed after {attempts} attempt(s): {message}")]
pub struct BackendError {
    /// Gateway operation name (`summarize`, `classify`, `store`, `list`, `health`).
    pub operation: String,
    /// Number of attempts made, including the first one.
    pub attempts: u32,
    /// Last observed cause.
    pub message: String,
}

/// Cause of a single failed backend attempt.
///
/// Every variant is treated as transient by the retry policy.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, timeout, or body decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response parsed but is not acceptable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field is blank
    #[error("'{0}' must not be blank")]
    BlankField(&'static str),

    /// Quiet hours window with identical start and end
    #[error("Quiet hours start and end must differ (both {0})")]
    EmptyQuietWindow(String),

    /// Snooze duration must be positive
    #[error("Snooze minutes must be greater than zero, got {0}")]
    NonPositiveMinutes(i64),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Local storage errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Connection mutex was poisoned by a panicking writer
    #[error("Database connection poisoned")]
    Poisoned,

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Deferred-task registration errors.
///
/// The item is already persisted when this is returned; callers should retry
/// (see `ResurfaceScheduler::rearm`).
#[derive(Error, Debug)]
pub enum SchedulingError {
    /// Task row could not be written
    #[error("Failed to register resurface task for {item_id}: {source}")]
    Register {
        item_id: String,
        #[source]
        source: PersistenceError,
    },

    /// Payload could not be encoded
    #[error("Failed to encode resurface payload for {item_id}: {message}")]
    Encode { item_id: String, message: String },
}

/// A deferred-task payload that can never be delivered. Not retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload is not valid JSON
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// A required field is absent or empty
    #[error("Payload missing required field '{0}'")]
    MissingField(&'static str),
}

/// The notification capability refused or failed to post. Retried by the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Reconciliation errors. The previous view is left untouched when one occurs.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote listing failed
    #[error("Remote listing failed: {0}")]
    Backend(#[from] BackendError),

    /// Local upsert failed
    #[error("Local merge failed: {0}")]
    Persistence(#[from] PersistenceError),

    /// A sync is already running
    #[error("Sync already in progress")]
    InProgress,
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    PersistenceError::Locked
                } else {
                    PersistenceError::QueryFailed(err.to_string())
                }
            }
            _ => PersistenceError::QueryFailed(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Malformed(err.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Persistence(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
