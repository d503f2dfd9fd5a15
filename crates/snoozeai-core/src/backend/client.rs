//! HTTP client for the triage backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    health_from_json, ClassifyOutcome, ClassifyRequest, ClassifyResponse, HealthReport,
    ItemsResponse, RemoteItem, StoreRequest, StoreResponse, SummarizeRequest, SummarizeResponse,
};
use crate::error::TransportError;
use crate::item::SnoozedItem;
use crate::storage::BackendConfig;

/// One attempt at each backend operation, without retries.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn summarize(&self, text: &str, max_tokens: Option<u32>) -> Result<String, TransportError>;

    async fn classify(&self, text: &str, hints: &[String]) -> Result<ClassifyOutcome, TransportError>;

    /// Upsert keyed by item id. Must be safe to repeat.
    async fn store(&self, item: &SnoozedItem) -> Result<(), TransportError>;

    async fn list(&self, limit: u32) -> Result<Vec<RemoteItem>, TransportError>;

    async fn health(&self) -> Result<HealthReport, TransportError>;
}

/// [`Backend`] over HTTP with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TransportError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn summarize(&self, text: &str, max_tokens: Option<u32>) -> Result<String, TransportError> {
        let resp = self
            .http_client
            .post(self.endpoint("summarize")?)
            .json(&SummarizeRequest { text, max_tokens })
            .send()
            .await?;
        let parsed: SummarizeResponse = Self::read_json(resp).await?;
        Ok(parsed.summary)
    }

    async fn classify(&self, text: &str, hints: &[String]) -> Result<ClassifyOutcome, TransportError> {
        let resp = self
            .http_client
            .post(self.endpoint("classify")?)
            .json(&ClassifyRequest { text, hints })
            .send()
            .await?;
        let parsed: ClassifyResponse = Self::read_json(resp).await?;
        Ok(parsed.into())
    }

    async fn store(&self, item: &SnoozedItem) -> Result<(), TransportError> {
        let resp = self
            .http_client
            .post(self.endpoint("store")?)
            .json(&StoreRequest::from(item))
            .send()
            .await?;
        let parsed: StoreResponse = Self::read_json(resp).await?;
        if !parsed.ok {
            return Err(TransportError::InvalidResponse(format!(
                "store not acknowledged for {}",
                item.id
            )));
        }
        Ok(())
    }

    async fn list(&self, limit: u32) -> Result<Vec<RemoteItem>, TransportError> {
        let mut url = self.endpoint("items")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let resp = self.http_client.get(url).send().await?;
        let parsed: ItemsResponse = Self::read_json(resp).await?;
        Ok(parsed.items)
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        let resp = self.http_client.get(self.endpoint("health")?).send().await?;
        let value: serde_json::Value = Self::read_json(resp).await?;
        health_from_json(value)
            .ok_or_else(|| TransportError::InvalidResponse("health is not a JSON object".into()))
    }
}
