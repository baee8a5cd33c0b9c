//! Transport trait and its reqwest implementation

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use super::types::{Method, RequestError};

/// A single outbound HTTP request relative to the store's base URL
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub endpoint: String,
    /// JSON body, already serialized
    pub body: Option<Bytes>,
}

/// Raw response as received; status classification happens in the client
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Trait for performing one request attempt (no retries, no caching)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Only failures to get any response are errors here.
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, RequestError>;
}

/// HTTP transport backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RequestError::Network(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, RequestError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::Timeout
            } else {
                RequestError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}
