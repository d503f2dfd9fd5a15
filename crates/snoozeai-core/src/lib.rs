//! # SnoozeAI Core Library
//!
//! Engine for deferring incoming notifications: each one is summarized and
//! classified by a remote backend, persisted locally with a quiet-hours
//! corrected `snooze_until`, and resurfaced exactly once by a durable task
//! that survives restarts. The CLI is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Quiet hours**: pure policy that moves an instant out of a daily window
//! - **Storage**: SQLite item store, settings and resurface queue; TOML config
//! - **Backend**: HTTP client behind a retrying gateway
//! - **Pipeline**: ingestion and user snooze flows (persist, then schedule)
//! - **Scheduler**: persistent resurface queue and the worker that fires it
//! - **Sync**: remote-wins reconciliation of the local store with the backend
//!
//! ## Key Components
//!
//! - [`IngestionPipeline`]: notification and snooze CRUD flows
//! - [`ResurfaceScheduler`] / [`ResurfaceWorker`]: durable resurfacing
//! - [`ReconciliationSync`]: local/remote merge
//! - [`Config`]: application configuration management

pub mod backend;
pub mod error;
pub mod item;
pub mod pipeline;
pub mod quiet_hours;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use backend::{Backend, BackendGateway, HttpBackend, RetryPolicy};
pub use error::{
    BackendError, ConfigError, CoreError, NotifyError, PayloadError, PersistenceError,
    SchedulingError, SyncError, TransportError, ValidationError,
};
pub use item::{Classification, SnoozedItem, UrgencyBucket};
pub use pipeline::{Ingested, IngestionPipeline, RemoteStatus};
pub use quiet_hours::{QuietHours, Zone};
pub use scheduler::{
    Notifier, Resurfaced, ResurfaceScheduler, ResurfaceWorker, ScheduledTask, WorkerOptions,
};
pub use storage::{Config, Database, Settings, SettingsStore, SnoozeItemStore, SqliteItemStore};
pub use sync::{ReconciliationSync, SyncReport, SyncStatus};
