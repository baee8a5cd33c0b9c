//! OverlayStore over HTTP, built on the resilient request client

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::service::OverlayStore;
use super::types::{Envelope, NewOverlay, Overlay, OverlayPatch};
use crate::config::Config;
use crate::request::{
    Method, ReqwestTransport, RequestClient, RequestError, RequestKey, RequestOptions,
};

const OVERLAYS_ENDPOINT: &str = "/overlays";

fn overlay_endpoint(id: &str) -> String {
    format!("{}/{}", OVERLAYS_ENDPOINT, id)
}

pub struct HttpOverlayStore {
    client: Arc<RequestClient>,
}

impl HttpOverlayStore {
    pub fn new(client: Arc<RequestClient>) -> Self {
        Self { client }
    }

    /// Build a store talking to `config.api_base_url` with the configured policy
    pub fn connect(config: &Config) -> Result<Self, RequestError> {
        let transport = ReqwestTransport::new(config.api_base_url.clone())?;
        let client = RequestClient::from_config(Arc::new(transport), &config.request);
        Ok(Self::new(Arc::new(client)))
    }

    pub fn client(&self) -> &Arc<RequestClient> {
        &self.client
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Envelope<T>, RequestError> {
        self.client
            .execute_json(method, endpoint, body, self.options())
            .await
    }

    fn options(&self) -> &RequestOptions {
        self.client.defaults()
    }

    /// Drop cached reads that a write to `id` made stale
    async fn invalidate_overlay(&self, id: &str) {
        self.client
            .invalidate(&RequestKey::get(OVERLAYS_ENDPOINT))
            .await;
        self.client
            .invalidate(&RequestKey::get(overlay_endpoint(id)))
            .await;
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RequestError> {
    serde_json::to_value(value).map_err(|e| RequestError::Decode(e.to_string()))
}

#[async_trait]
impl OverlayStore for HttpOverlayStore {
    async fn list(&self) -> Result<Vec<Overlay>, RequestError> {
        self.call(Method::Get, OVERLAYS_ENDPOINT, None)
            .await?
            .into_data()
    }

    async fn get(&self, id: &str) -> Result<Overlay, RequestError> {
        self.call(Method::Get, &overlay_endpoint(id), None)
            .await?
            .into_data()
    }

    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, RequestError> {
        let body = to_body(overlay)?;
        let created: Overlay = self
            .call(Method::Post, OVERLAYS_ENDPOINT, Some(&body))
            .await?
            .into_data()?;
        self.invalidate_overlay(&created.id).await;
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &OverlayPatch) -> Result<Overlay, RequestError> {
        let body = to_body(patch)?;
        debug!("Updating overlay {} with {}", id, body);
        let updated = self
            .call(Method::Put, &overlay_endpoint(id), Some(&body))
            .await?
            .into_data()?;
        self.invalidate_overlay(id).await;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), RequestError> {
        self.call::<serde::de::IgnoredAny>(Method::Delete, &overlay_endpoint(id), None)
            .await?
            .into_ack()?;
        self.invalidate_overlay(id).await;
        Ok(())
    }

    fn cancel_all(&self) {
        self.client.cancel_all();
    }
}
