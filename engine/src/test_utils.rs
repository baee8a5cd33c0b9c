//! Test Utilities Module
//!
//! Fixtures shared by the unit tests: a scripted transport for the request
//! client, an in-memory store double for the persistence queue, and a few
//! overlay and geometry helpers.
//! This module is only compiled when running tests.

#![cfg(test)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::geometry::ContainerRect;
use crate::gesture::{HapticKind, Haptics};
use crate::request::{OutboundRequest, RequestError, Transport, TransportResponse};
use crate::store::{
    NewOverlay, Overlay, OverlayKind, OverlayPatch, OverlayStore, Position, Size, StyleOverrides,
};

// ============================================================================
// Transport fixtures
// ============================================================================

enum Script {
    Sequence(Mutex<VecDeque<Result<TransportResponse, RequestError>>>),
    Repeat(TransportResponse),
}

/// Transport that replays canned responses and records every attempt
pub struct ScriptedTransport {
    script: Script,
    latency: Vec<Duration>,
    attempts: AtomicUsize,
    attempt_times: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    /// Answer attempts in order; once exhausted every attempt is a network error
    pub fn new(responses: Vec<Result<TransportResponse, RequestError>>) -> Self {
        Self::with_script(Script::Sequence(Mutex::new(responses.into())))
    }

    /// Answer every attempt with the same response
    pub fn repeating(response: TransportResponse) -> Self {
        Self::with_script(Script::Repeat(response))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            latency: Vec::new(),
            attempts: AtomicUsize::new(0),
            attempt_times: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay per attempt; the last value applies to all later attempts
    pub fn with_latency(mut self, latency: Vec<Duration>) -> Self {
        self.latency = latency;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempt_times.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn latency_for(&self, attempt: usize) -> Duration {
        match self.latency.len() {
            0 => Duration::ZERO,
            n => self.latency[attempt.min(n - 1)],
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, RequestError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().unwrap().push(Instant::now());
        self.requests.lock().unwrap().push(request.clone());

        let response = match &self.script {
            Script::Sequence(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RequestError::Network("script exhausted".into()))),
            Script::Repeat(response) => Ok(response.clone()),
        };

        let latency = self.latency_for(attempt);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        response
    }
}

/// Empty-bodied response with the given status
pub fn status(code: u16) -> TransportResponse {
    TransportResponse {
        status: code,
        body: Bytes::new(),
    }
}

/// 200 response carrying a JSON body
pub fn ok_json(value: serde_json::Value) -> TransportResponse {
    TransportResponse {
        status: 200,
        body: Bytes::from(value.to_string()),
    }
}

// ============================================================================
// Overlay fixtures
// ============================================================================

/// Text overlay at (10, 10) sized 20x10
pub fn sample_overlay(id: &str) -> Overlay {
    Overlay {
        id: id.to_string(),
        name: Some(format!("Overlay {}", id)),
        kind: OverlayKind::Text,
        content: "LIVE".to_string(),
        position: Position::new(10.0, 10.0),
        size: Size::new(20.0, 10.0),
        style: StyleOverrides::default(),
        created_at: None,
        updated_at: None,
    }
}

/// 1000x1000 px container at the origin: 10 px per percent
pub fn test_container() -> ContainerRect {
    ContainerRect::new(0.0, 0.0, 1000.0, 1000.0)
}

/// Let spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Store double
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub id: String,
    pub patch: OverlayPatch,
    pub at: Instant,
}

/// Store that records updates and fails on demand
#[derive(Default)]
pub struct MockStore {
    updates: Mutex<Vec<RecordedUpdate>>,
    failures: Mutex<VecDeque<RequestError>>,
    latency: Duration,
    cancelled: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Make the next update fail with `error`
    pub fn fail_next(&self, error: RequestError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OverlayStore for MockStore {
    async fn list(&self) -> Result<Vec<Overlay>, RequestError> {
        Ok(Vec::new())
    }

    async fn get(&self, id: &str) -> Result<Overlay, RequestError> {
        Ok(sample_overlay(id))
    }

    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, RequestError> {
        Ok(Overlay {
            id: format!("mock-{}", self.update_count()),
            name: overlay.name.clone(),
            kind: overlay.kind,
            content: overlay.content.clone(),
            position: overlay.position,
            size: overlay.size,
            style: overlay.style.clone(),
            created_at: None,
            updated_at: None,
        })
    }

    async fn update(&self, id: &str, patch: &OverlayPatch) -> Result<Overlay, RequestError> {
        self.updates.lock().unwrap().push(RecordedUpdate {
            id: id.to_string(),
            patch: *patch,
            at: Instant::now(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut overlay = sample_overlay(id);
        let geometry = patch.applied_to(overlay.geometry());
        overlay.position = geometry.position;
        overlay.size = geometry.size;
        Ok(overlay)
    }

    async fn delete(&self, _id: &str) -> Result<(), RequestError> {
        Ok(())
    }

    fn cancel_all(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Haptics double
// ============================================================================

#[derive(Default)]
pub struct RecordingHaptics {
    pulses: Mutex<Vec<HapticKind>>,
}

impl RecordingHaptics {
    pub fn pulses(&self) -> Vec<HapticKind> {
        self.pulses.lock().unwrap().clone()
    }
}

impl Haptics for RecordingHaptics {
    fn pulse(&self, kind: HapticKind) {
        self.pulses.lock().unwrap().push(kind);
    }
}
