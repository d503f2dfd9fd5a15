//! In-memory [`Backend`] for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::client::Backend;
use super::types::{ClassifyOutcome, HealthReport, RemoteItem};
use crate::error::TransportError;
use crate::item::{Classification, SnoozedItem};

type ErrorFactory = Arc<dyn Fn() -> TransportError + Send + Sync>;

struct FakeState {
    calls: HashMap<&'static str, u32>,
    failures: HashMap<&'static str, (u32, ErrorFactory)>,
    summary: String,
    classification: Classification,
    stored: Vec<SnoozedItem>,
    remote: Vec<RemoteItem>,
}

pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: HashMap::new(),
                failures: HashMap::new(),
                summary: "summary".into(),
                classification: Classification::Classified(0.5),
                stored: Vec::new(),
                remote: Vec::new(),
            }),
        }
    }

    pub(crate) fn with_summary(self, summary: &str) -> Self {
        self.state.lock().unwrap().summary = summary.to_string();
        self
    }

    pub(crate) fn with_classification(self, classification: Classification) -> Self {
        self.state.lock().unwrap().classification = classification;
        self
    }

    pub(crate) fn set_remote(&self, items: Vec<RemoteItem>) {
        self.state.lock().unwrap().remote = items;
    }

    pub(crate) fn fail_next(&self, op: &'static str, times: u32) {
        self.fail_next_with(op, times, || TransportError::Status {
            status: 503,
            body: "unavailable".into(),
        });
    }

    pub(crate) fn fail_next_with(
        &self,
        op: &'static str,
        times: u32,
        error: impl Fn() -> TransportError + Send + Sync + 'static,
    ) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, (times, Arc::new(error)));
    }

    pub(crate) fn calls(&self, op: &str) -> u32 {
        self.state.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    pub(crate) fn stored(&self) -> Vec<SnoozedItem> {
        self.state.lock().unwrap().stored.clone()
    }

    fn hit(&self, op: &'static str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some((remaining, error)) = state.failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn summarize(&self, _text: &str, _max_tokens: Option<u32>) -> Result<String, TransportError> {
        self.hit("summarize")?;
        Ok(self.state.lock().unwrap().summary.clone())
    }

    async fn classify(&self, _text: &str, _hints: &[String]) -> Result<ClassifyOutcome, TransportError> {
        self.hit("classify")?;
        Ok(ClassifyOutcome {
            classification: self.state.lock().unwrap().classification,
            label: "normal".into(),
        })
    }

    async fn store(&self, item: &SnoozedItem) -> Result<(), TransportError> {
        self.hit("store")?;
        let mut state = self.state.lock().unwrap();
        state.stored.retain(|s| s.id != item.id);
        state.stored.push(item.clone());
        Ok(())
    }

    async fn list(&self, limit: u32) -> Result<Vec<RemoteItem>, TransportError> {
        self.hit("list")?;
        let state = self.state.lock().unwrap();
        Ok(state.remote.iter().take(limit as usize).cloned().collect())
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        self.hit("health")?;
        Ok(HealthReport::from([("ok".to_string(), true)]))
    }
}
