//! Loyalty/points collaborator: resolve a contact to a point balance and tier.

use crate::orders::LookupError;
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8932";

/// Point balance and tier for one customer account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyProfile {
    pub points: u64,
    pub level_name: String,
    #[serde(default)]
    pub discount_percent: u8,
}

/// Resolves a contact id to its loyalty profile, when one exists.
///
/// Contacts are matched lazily per request; the engine never caches the
/// answer, so a customer registered mid-conversation is picked up on the
/// next turn.
#[async_trait]
pub trait LoyaltyService: Send + Sync {
    async fn profile(&self, contact_id: &str) -> Result<Option<LoyaltyProfile>, LookupError>;
}

/// HTTP implementation against the loyalty service (`GET /loyalty/{contactId}`).
#[derive(Clone)]
pub struct HttpLoyaltyService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLoyaltyService {
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
impl LoyaltyService for HttpLoyaltyService {
    async fn profile(&self, contact_id: &str) -> Result<Option<LoyaltyProfile>, LookupError> {
        let url = format!("{}/loyalty/{}", self.base_url, contact_id);
        let res = self.client.get(&url).send().await?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LookupError::Api(format!("{} {}", status, body)));
        }
        let profile: LoyaltyProfile = res.json().await?;
        Ok(Some(profile))
    }
}
