//! Wire types for the triage backend.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{whole_seconds, Classification, SnoozedItem};

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "no_hints")]
    pub hints: &'a [String],
}

fn no_hints(hints: &&[String]) -> bool {
    hints.is_empty()
}

/// Urgency as the backend sends it: a number, or a number in a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrgencyValue {
    Number(f64),
    Text(String),
}

impl UrgencyValue {
    /// Interpret as a classification. Text that is not a number is a failure.
    pub fn classification(&self) -> Classification {
        match self {
            UrgencyValue::Number(n) => Classification::from_score(*n),
            UrgencyValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Classification::from_score)
                .unwrap_or(Classification::Failed),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyResponse {
    #[serde(default)]
    pub urgency: Option<UrgencyValue>,
    #[serde(default)]
    pub label: String,
}

/// Result of a classify call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOutcome {
    pub classification: Classification,
    /// Backend label, informational only.
    pub label: String,
}

impl From<ClassifyResponse> for ClassifyOutcome {
    fn from(resp: ClassifyResponse) -> Self {
        let classification = resp
            .urgency
            .as_ref()
            .map_or(Classification::Failed, UrgencyValue::classification);
        Self {
            classification,
            label: resp.label,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRequest<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    pub snooze_until: String,
}

impl<'a> From<&'a SnoozedItem> for StoreRequest<'a> {
    fn from(item: &'a SnoozedItem) -> Self {
        Self {
            id: &item.id,
            title: &item.title,
            body: &item.body,
            summary: &item.summary,
            urgency: item.urgency().map(|u| u.to_string()),
            snooze_until: format_instant(item.snooze_until),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreResponse {
    pub ok: bool,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<RemoteItem>,
}

/// An item as listed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub urgency: Option<UrgencyValue>,
    #[serde(alias = "snooze_until")]
    pub snooze_until: String,
}

impl RemoteItem {
    /// Convert to a local item.
    ///
    /// A missing or blank body falls back to the summary. Returns `None` when
    /// `snoozeUntil` cannot be parsed.
    pub fn into_item(self) -> Option<SnoozedItem> {
        let snooze_until = parse_instant(&self.snooze_until)?;
        let body = match self.body {
            Some(body) if !body.trim().is_empty() => body,
            _ => self.summary.clone(),
        };
        let classification = self
            .urgency
            .as_ref()
            .map_or(Classification::Unclassified, UrgencyValue::classification);

        Some(SnoozedItem {
            id: self.id,
            title: crate::item::title_or_default(&self.title),
            body,
            summary: self.summary,
            classification,
            snooze_until,
        })
    }
}

/// `GET /health` flags. Non-boolean values are dropped.
pub type HealthReport = BTreeMap<String, bool>;

pub(crate) fn health_from_json(value: serde_json::Value) -> Option<HealthReport> {
    match value {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(k, v)| v.as_bool().map(|b| (k, b)))
                .collect(),
        ),
        _ => None,
    }
}

/// RFC 3339 in UTC with a `Z` suffix.
pub fn format_instant(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO-8601 instant. A timestamp without an offset is read as UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(whole_seconds(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| whole_seconds(naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn urgency_accepts_number_or_numeric_string() {
        let n: ClassifyResponse = serde_json::from_str(r#"{"urgency": 0.82, "label": "urgent"}"#).unwrap();
        assert_eq!(ClassifyOutcome::from(n).classification, Classification::Classified(0.82));

        let s: ClassifyResponse = serde_json::from_str(r#"{"urgency": " 0.3 ", "label": "normal"}"#).unwrap();
        assert_eq!(ClassifyOutcome::from(s).classification, Classification::Classified(0.3));

        let bad: ClassifyResponse = serde_json::from_str(r#"{"urgency": "very", "label": "?"}"#).unwrap();
        assert_eq!(ClassifyOutcome::from(bad).classification, Classification::Failed);

        let missing: ClassifyResponse = serde_json::from_str(r#"{"label": "normal"}"#).unwrap();
        assert_eq!(ClassifyOutcome::from(missing).classification, Classification::Failed);
    }

    #[test]
    fn store_request_shape() {
        let item = SnoozedItem {
            id: "id-1".into(),
            title: "Bank".into(),
            body: "Your card was used".into(),
            summary: "Card used".into(),
            classification: Classification::Classified(0.9),
            snooze_until: Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap(),
        };
        let json = serde_json::to_value(StoreRequest::from(&item)).unwrap();
        assert_eq!(json["snoozeUntil"], "2025-03-11T07:30:00Z");
        assert_eq!(json["urgency"], "0.9");

        let unclassified = SnoozedItem {
            classification: Classification::Unclassified,
            ..item
        };
        let json = serde_json::to_value(StoreRequest::from(&unclassified)).unwrap();
        assert!(json.get("urgency").is_none());
    }

    #[test]
    fn remote_item_body_falls_back_to_summary() {
        let remote: RemoteItem = serde_json::from_str(
            r#"{"id":"r1","title":"","summary":"Call back","urgency":0.5,"snoozeUntil":"2025-03-11T07:30:00"}"#,
        )
        .unwrap();
        let item = remote.into_item().unwrap();
        assert_eq!(item.body, "Call back");
        assert_eq!(item.title, crate::item::DEFAULT_TITLE);
        assert_eq!(item.snooze_until, Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap());
        assert_eq!(item.classification, Classification::Classified(0.5));
    }

    #[test]
    fn remote_item_with_bad_instant_is_rejected() {
        let remote: RemoteItem =
            serde_json::from_str(r#"{"id":"r1","summary":"s","snoozeUntil":"tomorrow"}"#).unwrap();
        assert!(remote.into_item().is_none());
    }

    #[test]
    fn parse_instant_accepts_offsets() {
        assert_eq!(
            parse_instant("2025-03-11T09:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap())
        );
        assert_eq!(
            parse_instant("2025-03-11T07:30:00.250Z"),
            Some(Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap())
        );
    }

    #[test]
    fn health_keeps_boolean_flags() {
        let report = health_from_json(serde_json::json!({"ok": true, "db": false, "version": "1"})).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.get("ok"), Some(&true));
        assert!(health_from_json(serde_json::json!([1, 2])).is_none());
    }
}
