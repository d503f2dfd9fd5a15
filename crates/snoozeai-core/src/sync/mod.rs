//! Backend reconciliation.
//!
//! [`ReconciliationSync`] fetches the remote listing, upserts every remote
//! item into the local store (remote wins, local-only items stay), and
//! re-registers resurface tasks for items that are new or were moved.

mod engine;
mod merge;
mod types;

pub use engine::{ReconciliationSync, DEFAULT_PAGE_LIMIT};
pub use merge::{decide_merge, local_only, merge};
pub use types::{MergeDecision, SyncReport, SyncStatus};
