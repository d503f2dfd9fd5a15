//! Remote-wins merge of local and remote item sets.

use std::collections::HashMap;

use super::types::MergeDecision;
use crate::item::{sort_for_listing, SnoozedItem};

/// Union of `local` and `remote` keyed by id, remote wins on conflict.
///
/// The result is in listing order (`snooze_until` descending).
pub fn merge(local: &[SnoozedItem], remote: &[SnoozedItem]) -> Vec<SnoozedItem> {
    let mut by_id: HashMap<&str, &SnoozedItem> =
        local.iter().map(|item| (item.id.as_str(), item)).collect();
    for item in remote {
        by_id.insert(item.id.as_str(), item);
    }

    let mut merged: Vec<SnoozedItem> = by_id.into_values().cloned().collect();
    sort_for_listing(&mut merged);
    merged
}

/// Decide how `remote` applies to the local copy, if any.
pub fn decide_merge(local: Option<&SnoozedItem>, remote: &SnoozedItem) -> MergeDecision {
    match local {
        None => MergeDecision::Insert,
        Some(local) if local == remote => MergeDecision::Unchanged,
        Some(local) => MergeDecision::UseRemote {
            resurface_changed: local.snooze_until != remote.snooze_until
                || local.title != remote.title
                || local.summary != remote.summary,
        },
    }
}

/// Ids in `local` that `remote` does not mention.
pub fn local_only(local: &[SnoozedItem], remote: &[SnoozedItem]) -> Vec<String> {
    let mut ids: Vec<String> = local
        .iter()
        .filter(|l| !remote.iter().any(|r| r.id == l.id))
        .map(|l| l.id.clone())
        .collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Classification;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    fn item(id: &str, title: &str, snooze_until: DateTime<Utc>) -> SnoozedItem {
        SnoozedItem {
            id: id.into(),
            title: title.into(),
            body: "body".into(),
            summary: "summary".into(),
            classification: Classification::Unclassified,
            snooze_until,
        }
    }

    #[test]
    fn merge_overlays_remote_and_keeps_local_only() {
        let local = vec![item("A", "local A", t(1)), item("B", "local B", t(2))];
        let remote = vec![item("B", "remote B", t(3)), item("C", "remote C", t(4))];

        let merged = merge(&local, &remote);
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "A"]);
        assert_eq!(merged[1].title, "remote B");
        assert_eq!(merged[1].snooze_until, t(3));
        assert_eq!(merged[2].title, "local A");
    }

    #[test]
    fn merge_is_idempotent() {
        let local = vec![item("A", "a", t(1))];
        let remote = vec![item("A", "a2", t(5)), item("B", "b", t(2))];

        let once = merge(&local, &remote);
        let twice = merge(&once, &remote);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_with_empty_remote_returns_local_in_order() {
        let local = vec![item("A", "a", t(1)), item("B", "b", t(2))];
        let merged = merge(&local, &[]);
        assert_eq!(merged[0].id, "B");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn decide_merge_cases() {
        let local = item("A", "a", t(1));
        assert_eq!(decide_merge(None, &local), MergeDecision::Insert);
        assert_eq!(decide_merge(Some(&local), &local.clone()), MergeDecision::Unchanged);
        assert_eq!(
            decide_merge(Some(&local), &item("A", "renamed", t(1))),
            MergeDecision::UseRemote { resurface_changed: true }
        );
        assert_eq!(
            decide_merge(Some(&local), &item("A", "a", t(2))),
            MergeDecision::UseRemote { resurface_changed: true }
        );
        let reclassified = SnoozedItem {
            classification: Classification::Classified(0.5),
            ..local.clone()
        };
        assert_eq!(
            decide_merge(Some(&local), &reclassified),
            MergeDecision::UseRemote { resurface_changed: false }
        );
    }

    #[test]
    fn local_only_lists_missing_ids() {
        let local = vec![item("A", "a", t(1)), item("B", "b", t(2))];
        let remote = vec![item("B", "b", t(2))];
        assert_eq!(local_only(&local, &remote), vec!["A".to_string()]);
    }
}
