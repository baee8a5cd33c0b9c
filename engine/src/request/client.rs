//! Resilient request client
//!
//! Wraps a [`Transport`] with per-attempt timeouts, exponential backoff,
//! cancellation keyed by request identity, and a short-lived cache for GET
//! responses. The client knows nothing about overlays.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::{AbortHandle, Abortable};
use metrics::counter;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::cache::{ResponseCache, ResponseCacheConfig};
use super::transport::{OutboundRequest, Transport, TransportResponse};
use super::types::{Method, RequestError, RequestKey, RequestOptions};
use crate::config::RequestConfig;

/// Longest error message kept from a response body
const MAX_ERROR_MESSAGE_LEN: usize = 200;

struct InFlight {
    ticket: u64,
    handle: AbortHandle,
}

pub struct RequestClient {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    in_flight: DashMap<RequestKey, Vec<InFlight>>,
    defaults: RequestOptions,
    next_ticket: AtomicU64,
}

impl RequestClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(
            transport,
            RequestOptions::default(),
            ResponseCacheConfig::default(),
        )
    }

    pub fn with_options(
        transport: Arc<dyn Transport>,
        defaults: RequestOptions,
        cache: ResponseCacheConfig,
    ) -> Self {
        Self {
            transport,
            cache: ResponseCache::new(cache),
            in_flight: DashMap::new(),
            defaults,
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &RequestConfig) -> Self {
        Self::with_options(
            transport,
            RequestOptions::from(config),
            ResponseCacheConfig {
                max_entries: config.cache_max_entries,
                ttl_ceiling: config.cache_ttl,
            },
        )
    }

    /// Options applied when a caller has no specific policy
    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Execute a request with retries, returning the raw response body.
    ///
    /// Requests sharing a key run side by side; each resolves on its own
    /// unless cancelled through [`RequestClient::cancel`] or
    /// [`RequestClient::cancel_all`], which end it with
    /// [`RequestError::Aborted`].
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<Bytes, RequestError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RequestError::Decode(e.to_string()))?;
        let key = RequestKey::new(method, endpoint, body.clone());

        let cache_ttl = options.cache_ttl.filter(|_| method == Method::Get);
        if cache_ttl.is_some()
            && let Some(cached) = self.cache.get(&key).await
        {
            debug!("Cache hit for {}", key);
            return Ok(cached);
        }

        let (handle, registration) = AbortHandle::new_pair();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.in_flight
            .entry(key.clone())
            .or_default()
            .push(InFlight { ticket, handle });

        let request = OutboundRequest {
            method,
            endpoint: endpoint.to_string(),
            body: body.map(Bytes::from),
        };
        let outcome = Abortable::new(self.run_with_retries(&request, options), registration).await;
        self.in_flight.remove_if_mut(&key, |_, entries| {
            entries.retain(|entry| entry.ticket != ticket);
            entries.is_empty()
        });

        let body = match outcome {
            Ok(result) => result?,
            Err(_) => {
                debug!("Request {} was cancelled", key);
                return Err(RequestError::Aborted);
            }
        };

        if let Some(ttl) = cache_ttl {
            self.cache.insert(key, body.clone(), ttl).await;
        }
        Ok(body)
    }

    /// Execute a request and decode its JSON body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
    ) -> Result<T, RequestError> {
        let bytes = self.execute(method, endpoint, body, options).await?;
        serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// Abort every in-flight request with this key. Returns whether any existed.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        match self.in_flight.remove(key) {
            Some((_, entries)) => {
                for entry in &entries {
                    entry.handle.abort();
                }
                debug!("Cancelled {} requests for {}", entries.len(), key);
                !entries.is_empty()
            }
            None => false,
        }
    }

    /// Abort every in-flight request, returning how many were aborted
    pub fn cancel_all(&self) -> usize {
        let mut aborted = 0;
        self.in_flight.retain(|_, entries| {
            for entry in entries.iter() {
                entry.handle.abort();
            }
            aborted += entries.len();
            false
        });
        if aborted > 0 {
            debug!("Cancelled {} in-flight requests", aborted);
        }
        aborted
    }

    /// Number of requests currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.iter().map(|entries| entries.len()).sum()
    }

    /// Drop a cached response; callers do this after mutating the resource
    pub async fn invalidate(&self, key: &RequestKey) {
        self.cache.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn run_with_retries(
        &self,
        request: &OutboundRequest,
        options: &RequestOptions,
    ) -> Result<Bytes, RequestError> {
        let mut attempt: u32 = 0;
        loop {
            counter!("overlay_requests_total", "method" => request.method.as_str()).increment(1);

            let outcome = match tokio::time::timeout(options.timeout, self.transport.send(request))
                .await
            {
                Ok(result) => result.and_then(check_status),
                Err(_) => Err(RequestError::Timeout),
            };

            match outcome {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < options.retries => {
                    attempt += 1;
                    let delay = backoff_delay(options.retry_delay, attempt);
                    warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        request.method, request.endpoint, e, attempt, options.retries, delay
                    );
                    counter!("overlay_request_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    counter!("overlay_request_failures_total").increment(1);
                    return Err(e);
                }
            }
        }
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    base.saturating_mul(2u32.saturating_pow(exponent))
}

fn check_status(response: TransportResponse) -> Result<Bytes, RequestError> {
    if (200..300).contains(&response.status) {
        return Ok(response.body);
    }
    Err(RequestError::Http {
        status: response.status,
        message: error_message(&response.body),
    })
}

/// Pull a human-readable message out of an error response body
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for field in ["error", "message"] {
            if let Some(message) = value.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_MESSAGE_LEN)
        .collect()
}
