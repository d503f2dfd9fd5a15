//! Retrying gateway over a [`Backend`].

use crate::error::BackendError;
use crate::item::SnoozedItem;

use super::client::Backend;
use super::retry::RetryPolicy;
use super::types::{ClassifyOutcome, HealthReport, RemoteItem};

/// Every call is retried per the [`RetryPolicy`] and fails with a
/// [`BackendError`] once the budget is spent.
pub struct BackendGateway<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: Backend> BackendGateway<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn summarize(&self, text: &str, max_tokens: Option<u32>) -> Result<String, BackendError> {
        self.policy
            .run("summarize", move || self.backend.summarize(text, max_tokens))
            .await
    }

    pub async fn classify(&self, text: &str, hints: &[String]) -> Result<ClassifyOutcome, BackendError> {
        self.policy
            .run("classify", move || self.backend.classify(text, hints))
            .await
    }

    pub async fn store(&self, item: &SnoozedItem) -> Result<(), BackendError> {
        self.policy.run("store", move || self.backend.store(item)).await
    }

    pub async fn list(&self, limit: u32) -> Result<Vec<RemoteItem>, BackendError> {
        self.policy.run("list", move || self.backend.list(limit)).await
    }

    pub async fn health(&self) -> Result<HealthReport, BackendError> {
        self.policy.run("health", move || self.backend.health()).await
    }
}
