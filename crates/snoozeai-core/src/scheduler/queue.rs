//! Durable resurface task queue backed by the `resurface_tasks` table.
//!
//! One row per item. Every transition out of `firing` is guarded by the
//! row's generation, so a worker that claimed an older generation can never
//! overwrite a task that was re-scheduled underneath it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::storage::Database;

/// Lifecycle of a resurface task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for `fire_at`.
    Scheduled,
    /// Claimed by a worker, delivery in progress.
    Firing,
    Delivered,
    /// Item was deleted.
    Cancelled,
    /// Item changed after this task was scheduled.
    Superseded,
    /// Permanent failure (bad payload or delivery attempts exhausted).
    Failed,
}

impl TaskState {
    pub const ALL: [TaskState; 6] = [
        TaskState::Scheduled,
        TaskState::Firing,
        TaskState::Delivered,
        TaskState::Cancelled,
        TaskState::Superseded,
        TaskState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Firing => "firing",
            TaskState::Delivered => "delivered",
            TaskState::Cancelled => "cancelled",
            TaskState::Superseded => "superseded",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Scheduled | TaskState::Firing)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown task state: {s}"))
    }
}

/// Stable task key for an item.
pub fn task_key(item_id: &str) -> String {
    format!("resurface:{item_id}")
}

/// A row of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResurfaceTask {
    pub key: String,
    pub item_id: String,
    pub payload: String,
    pub fire_at: DateTime<Utc>,
    pub state: TaskState,
    /// Bumped on every re-schedule.
    pub generation: i64,
    /// Delivery attempts for the current generation.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Task counts per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub scheduled: u64,
    pub firing: u64,
    pub delivered: u64,
    pub cancelled: u64,
    pub superseded: u64,
    pub failed: u64,
    pub next_fire_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = "SELECT task_key, item_id, payload, fire_at, state, generation, attempts, last_error, updated_at FROM resurface_tasks";

fn epoch_to_instant(idx: usize, epoch: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {epoch}").into(),
        )
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<ResurfaceTask> {
    let state: String = row.get(4)?;
    let state = state.parse::<TaskState>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(ResurfaceTask {
        key: row.get(0)?,
        item_id: row.get(1)?,
        payload: row.get(2)?,
        fire_at: epoch_to_instant(3, row.get(3)?)?,
        state,
        generation: row.get(5)?,
        attempts: row.get(6)?,
        last_error: row.get(7)?,
        updated_at: epoch_to_instant(8, row.get(8)?)?,
    })
}

/// Persistent queue of resurface tasks.
#[derive(Clone)]
pub struct ResurfaceQueue {
    db: Arc<Database>,
}

impl ResurfaceQueue {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or replace the item's task as `scheduled`.
    ///
    /// An existing row keeps its key, gets a new generation, and has its
    /// attempt count reset.
    pub fn upsert_scheduled(
        &self,
        item_id: &str,
        payload: &str,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ResurfaceTask, PersistenceError> {
        let key = task_key(item_id);
        self.db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO resurface_tasks
                    (task_key, item_id, payload, fire_at, state, generation, attempts, last_error, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'scheduled', 1, 0, NULL, ?5)
                 ON CONFLICT(task_key) DO UPDATE SET
                    payload = excluded.payload,
                    fire_at = excluded.fire_at,
                    state = 'scheduled',
                    generation = resurface_tasks.generation + 1,
                    attempts = 0,
                    last_error = NULL,
                    updated_at = excluded.updated_at",
                params![key, item_id, payload, fire_at.timestamp(), now.timestamp()],
            )?;
            tx.query_row(
                &format!("{SELECT_COLUMNS} WHERE task_key = ?1"),
                params![key],
                row_to_task,
            )
        })
    }

    pub fn get(&self, item_id: &str) -> Result<Option<ResurfaceTask>, PersistenceError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE task_key = ?1"),
                params![task_key(item_id)],
                row_to_task,
            )
            .optional()
        })
    }

    /// All tasks, soonest first.
    pub fn list(&self) -> Result<Vec<ResurfaceTask>, PersistenceError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY fire_at ASC, task_key ASC"))?;
            let tasks = stmt.query_map([], row_to_task)?.collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Mark a pending task `cancelled`. Returns whether one was pending.
    pub fn cancel(&self, item_id: &str, now: DateTime<Utc>) -> Result<bool, PersistenceError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE resurface_tasks SET state = 'cancelled', updated_at = ?2
                 WHERE task_key = ?1 AND state IN ('scheduled', 'firing')",
                params![task_key(item_id), now.timestamp()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Atomically claim the earliest due task, moving it to `firing`.
    pub fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<ResurfaceTask>, PersistenceError> {
        self.db.with_transaction(|tx| {
            let due = tx
                .query_row(
                    &format!(
                        "{SELECT_COLUMNS} WHERE state = 'scheduled' AND fire_at <= ?1
                         ORDER BY fire_at ASC, task_key ASC LIMIT 1"
                    ),
                    params![now.timestamp()],
                    row_to_task,
                )
                .optional()?;
            let Some(mut task) = due else {
                return Ok(None);
            };

            let changed = tx.execute(
                "UPDATE resurface_tasks
                 SET state = 'firing', attempts = attempts + 1, updated_at = ?3
                 WHERE task_key = ?1 AND generation = ?2 AND state = 'scheduled'",
                params![task.key, task.generation, now.timestamp()],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            task.state = TaskState::Firing;
            task.attempts += 1;
            task.updated_at = now;
            Ok(Some(task))
        })
    }

    /// Move a claimed task to a terminal state.
    ///
    /// Returns `false` if the task was re-scheduled or cancelled since it
    /// was claimed; the newer state is left alone.
    pub fn finish(
        &self,
        task: &ResurfaceTask,
        state: TaskState,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        self.transition_from_firing(task, state, error, now)
    }

    /// Return a claimed task to `scheduled` after a transient failure.
    pub fn release(
        &self,
        task: &ResurfaceTask,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        self.transition_from_firing(task, TaskState::Scheduled, Some(error), now)
    }

    fn transition_from_firing(
        &self,
        task: &ResurfaceTask,
        state: TaskState,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE resurface_tasks SET state = ?3, last_error = ?4, updated_at = ?5
                 WHERE task_key = ?1 AND generation = ?2 AND state = 'firing'",
                params![task.key, task.generation, state.as_str(), error, now.timestamp()],
            )?;
            Ok(changed > 0)
        })
    }

    /// Re-queue tasks left in `firing` since before `stale_before`.
    pub fn recover_stale(&self, stale_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize, PersistenceError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE resurface_tasks
                 SET state = 'scheduled', last_error = 'lease expired', updated_at = ?2
                 WHERE state = 'firing' AND updated_at < ?1",
                params![stale_before.timestamp(), now.timestamp()],
            )
        })
    }

    /// Delete terminal tasks last touched before `before`.
    pub fn purge_terminal(&self, before: DateTime<Utc>) -> Result<usize, PersistenceError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM resurface_tasks
                 WHERE state NOT IN ('scheduled', 'firing') AND updated_at < ?1",
                params![before.timestamp()],
            )
        })
    }

    pub fn stats(&self) -> Result<QueueStats, PersistenceError> {
        self.db.with_conn(|conn| {
            let mut stats = QueueStats::default();
            let mut stmt = conn.prepare("SELECT state, COUNT(*) FROM resurface_tasks GROUP BY state")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
            for row in rows {
                let (state, count) = row?;
                match state.parse::<TaskState>() {
                    Ok(TaskState::Scheduled) => stats.scheduled = count,
                    Ok(TaskState::Firing) => stats.firing = count,
                    Ok(TaskState::Delivered) => stats.delivered = count,
                    Ok(TaskState::Cancelled) => stats.cancelled = count,
                    Ok(TaskState::Superseded) => stats.superseded = count,
                    Ok(TaskState::Failed) => stats.failed = count,
                    Err(e) => tracing::warn!(error = %e, "ignoring unknown task state"),
                }
            }

            let next: Option<i64> = conn.query_row(
                "SELECT MIN(fire_at) FROM resurface_tasks WHERE state = 'scheduled'",
                [],
                |row| row.get(0),
            )?;
            stats.next_fire_at = next.and_then(|epoch| DateTime::from_timestamp(epoch, 0));
            Ok(stats)
        })
    }
}
