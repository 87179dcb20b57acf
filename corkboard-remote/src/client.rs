use super::config::RemoteConfig;
use super::types::{BatchRequest, CardsResponse, ErrorResponse};
use async_trait::async_trait;
use corkboard::{
    BatchEntry, BoardBackend, Card, Connection, ConnectionPatch, CorkboardError, Result,
};
use reqwest::{Method, Response, Url};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Board API client over HTTP/JSON.
pub struct RemoteBackend {
    base_url: Url,
    http_client: reqwest::Client,
    last_success: Arc<AtomicU64>, // Unix timestamp in seconds
}

impl RemoteBackend {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_url).map_err(|e| {
            CorkboardError::Config(format!("invalid api_url {:?}: {}", config.api_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CorkboardError::Config(format!(
                "api_url {:?} cannot be used as a base URL",
                config.api_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            base_url,
            http_client,
            last_success: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn last_success_timestamp(&self) -> u64 {
        self.last_success.load(Ordering::Relaxed)
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CorkboardError::Config("api_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        tracing::debug!("[remote] {} {}", method, url);
        let mut request = self.http_client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CorkboardError::Network(format!("{} {} failed: {}", method, url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.message)
                .ok()
                .filter(|m| !m.is_empty())
                .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            tracing::warn!("[remote] {} {} returned {}: {}", method, url, status, message);
            return Err(CorkboardError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_success.store(now, Ordering::Relaxed);

        Ok(response)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl BoardBackend for RemoteBackend {
    async fn send_batch(&self, entries: &[BatchEntry]) -> Result<()> {
        let url = self.url(&["cards", "batch"])?;
        let body = to_json(&BatchRequest { entries })?;
        self.send(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    async fn create_connection(&self, card_id: &str, connection: &Connection) -> Result<()> {
        let url = self.url(&["cards", card_id, "connections"])?;
        self.send(Method::POST, url, Some(to_json(connection)?)).await?;
        Ok(())
    }

    async fn update_connection(
        &self,
        card_id: &str,
        connection_id: &str,
        patch: &ConnectionPatch,
    ) -> Result<()> {
        let url = self.url(&["cards", card_id, "connections", connection_id])?;
        self.send(Method::PATCH, url, Some(to_json(patch)?)).await?;
        Ok(())
    }

    async fn delete_connection(&self, card_id: &str, connection_id: &str) -> Result<()> {
        let url = self.url(&["cards", card_id, "connections", connection_id])?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn delete_card(&self, card_id: &str) -> Result<()> {
        let url = self.url(&["cards", card_id])?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn refresh_entities(&self) -> Result<Vec<Card>> {
        let url = self.url(&["cards"])?;
        let response = self.send(Method::GET, url, None).await?;
        let body: CardsResponse = response
            .json()
            .await
            .map_err(|e| CorkboardError::Json(format!("failed to decode cards: {}", e)))?;
        tracing::debug!("[remote] refreshed {} cards", body.cards.len());
        Ok(body.cards)
    }
}
