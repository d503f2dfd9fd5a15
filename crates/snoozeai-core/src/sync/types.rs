//! Core types for backend reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last successful sync timestamp.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Whether a sync is currently in progress.
    pub in_progress: bool,
    /// Error from the most recent attempt, cleared on success.
    pub last_error: Option<String>,
    /// Items in the merged view after the last successful sync.
    pub item_count: usize,
}

/// Outcome of one successful sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Remote items returned by the backend.
    pub fetched: usize,
    /// Remote items written to the local store.
    pub upserted: usize,
    /// Remote items identical to the local copy.
    pub unchanged: usize,
    /// Remote items dropped because they could not be parsed.
    pub skipped: usize,
    /// Items whose resurface task was registered again.
    pub rescheduled: usize,
    /// Ids present locally but missing from the remote page. Kept as is.
    pub local_only: Vec<String>,
}

/// What a remote item means for its local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local copy.
    Insert,
    /// Local copy differs; remote wins. `resurface_changed` is set when
    /// a field carried by the resurface task moved: `snooze_until`,
    /// `title` or `summary`.
    UseRemote { resurface_changed: bool },
    /// Local copy already matches.
    Unchanged,
}
