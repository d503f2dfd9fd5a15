//! Durable storage of snoozed items.
//!
//! Rows are keyed by item id; `snooze_until` is stored as integer epoch
//! seconds and converted at this boundary.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::Database;
use crate::error::PersistenceError;
use crate::item::{whole_seconds, Classification, SnoozedItem};

/// Keyed storage of snoozed items.
///
/// Owns no scheduling logic. Every other component reads and writes items
/// through this interface.
pub trait SnoozeItemStore: Send + Sync {
    /// Insert or overwrite the item with the same id.
    fn upsert(&self, item: &SnoozedItem) -> Result<(), PersistenceError>;

    /// Look an item up by id.
    fn get(&self, id: &str) -> Result<Option<SnoozedItem>, PersistenceError>;

    /// Remove an item. Returns whether a row was deleted.
    fn delete(&self, id: &str) -> Result<bool, PersistenceError>;

    /// All items, most recent `snooze_until` first.
    fn list(&self) -> Result<Vec<SnoozedItem>, PersistenceError>;

    /// Items that resurface after `now`, soonest first.
    fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<SnoozedItem>, PersistenceError>;
}

/// [`SnoozeItemStore`] backed by the `snoozes` table.
#[derive(Clone)]
pub struct SqliteItemStore {
    db: Arc<Database>,
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, body, summary, urgency, classification, snooze_until FROM snoozes";

impl SqliteItemStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<SnoozedItem> {
        let urgency: Option<f64> = row.get(4)?;
        let state: Option<String> = row.get(5)?;
        let epoch: i64 = row.get(6)?;
        let snooze_until = DateTime::from_timestamp(epoch, 0).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                6,
                rusqlite::types::Type::Integer,
                format!("snooze_until out of range: {epoch}").into(),
            )
        })?;

        Ok(SnoozedItem {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            summary: row.get(3)?,
            classification: Classification::from_db(state.as_deref(), urgency),
            snooze_until,
        })
    }
}

impl SnoozeItemStore for SqliteItemStore {
    fn upsert(&self, item: &SnoozedItem) -> Result<(), PersistenceError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO snoozes (id, title, body, summary, urgency, classification, snooze_until)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    body = excluded.body,
                    summary = excluded.summary,
                    urgency = excluded.urgency,
                    classification = excluded.classification,
                    snooze_until = excluded.snooze_until",
                params![
                    item.id,
                    item.title,
                    item.body,
                    item.summary,
                    item.classification.score(),
                    item.classification.as_db_str(),
                    whole_seconds(item.snooze_until).timestamp(),
                ],
            )?;
            Ok(())
        })
    }

    fn get(&self, id: &str) -> Result<Option<SnoozedItem>, PersistenceError> {
        self.db.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
            match conn.query_row(&sql, params![id], Self::row_to_item) {
                Ok(item) => Ok(Some(item)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
        self.db.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM snoozes WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
    }

    fn list(&self) -> Result<Vec<SnoozedItem>, PersistenceError> {
        self.db.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} ORDER BY snooze_until DESC, id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map([], Self::row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }

    fn list_pending(&self, now: DateTime<Utc>) -> Result<Vec<SnoozedItem>, PersistenceError> {
        self.db.with_conn(|conn| {
            let sql = format!("{SELECT_COLUMNS} WHERE snooze_until > ?1 ORDER BY snooze_until ASC, id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(params![now.timestamp()], Self::row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store() -> SqliteItemStore {
        SqliteItemStore::new(Arc::new(Database::open_memory().unwrap()))
    }

    fn item(id: &str, at: DateTime<Utc>, classification: Classification) -> SnoozedItem {
        SnoozedItem {
            id: id.to_string(),
            title: format!("title {id}"),
            body: format!("body {id}"),
            summary: format!("summary {id}"),
            classification,
            snooze_until: at,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn upsert_then_get_round_trips_all_fields() {
        let store = store();
        let original = item("a", base(), Classification::Classified(0.75));
        store.upsert(&original).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(original));

        let failed = item("b", base(), Classification::Failed);
        store.upsert(&failed).unwrap();
        assert_eq!(store.get("b").unwrap().unwrap().classification, Classification::Failed);
    }

    #[test]
    fn upsert_overwrites_by_id() {
        let store = store();
        store.upsert(&item("a", base(), Classification::Unclassified)).unwrap();

        let mut updated = item("a", base() + Duration::hours(1), Classification::Classified(0.2));
        updated.title = "edited".into();
        store.upsert(&updated).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], updated);
    }

    #[test]
    fn sub_second_precision_is_dropped() {
        let store = store();
        let precise = base() + Duration::milliseconds(750);
        store.upsert(&item("a", precise, Classification::Unclassified)).unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().snooze_until, base());
    }

    #[test]
    fn list_is_descending_and_pending_is_ascending() {
        let store = store();
        store.upsert(&item("past", base() - Duration::minutes(5), Classification::Unclassified)).unwrap();
        store.upsert(&item("soon", base() + Duration::minutes(10), Classification::Unclassified)).unwrap();
        store.upsert(&item("late", base() + Duration::minutes(60), Classification::Unclassified)).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["late", "soon", "past"]);

        let pending: Vec<_> = store.list_pending(base()).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(pending, vec!["soon", "late"]);
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let store = store();
        store.upsert(&item("a", base(), Classification::Unclassified)).unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(store.get("a").unwrap().is_none());
    }
}
