//! Remote triage backend: summarize, classify, store, list, health.
//!
//! [`HttpBackend`] makes single attempts; [`BackendGateway`] wraps any
//! [`Backend`] with the bounded retry policy.

mod client;
mod gateway;
mod retry;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{Backend, HttpBackend};
pub use gateway::BackendGateway;
pub use retry::RetryPolicy;
pub use types::{ClassifyOutcome, HealthReport, RemoteItem, UrgencyValue};
