//! Order lookup collaborator: resolve an order number to shipment data.

use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8931";

/// Shipment data for one order, as returned by the order service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub status: String,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub total: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("lookup service error: {0}")]
    Api(String),
}

/// Resolves an order number (digits only) to its shipment data.
#[async_trait]
pub trait OrderLookup: Send + Sync {
    /// `Ok(None)` means the order does not exist; errors mean the service
    /// could not answer and the caller should degrade gracefully.
    async fn lookup(&self, order_number: &str) -> Result<Option<OrderInfo>, LookupError>;
}

/// HTTP implementation against the order service (`GET /orders/{digits}`).
#[derive(Clone)]
pub struct HttpOrderLookup {
    base_url: String,
    client: reqwest::Client,
}

impl HttpOrderLookup {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OrderLookup for HttpOrderLookup {
    async fn lookup(&self, order_number: &str) -> Result<Option<OrderInfo>, LookupError> {
        let url = format!("{}/orders/{}", self.base_url, order_number);
        let res = self.client.get(&url).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LookupError::Api(format!("{} {}", status, body)));
        }
        let info: OrderInfo = res.json().await?;
        Ok(Some(info))
    }
}
