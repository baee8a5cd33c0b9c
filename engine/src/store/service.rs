//! OverlayStore trait definition

use async_trait::async_trait;

use super::types::{NewOverlay, Overlay, OverlayPatch};
use crate::request::RequestError;

/// Trait for the remote overlay store (HTTP in production, mocks in tests)
#[async_trait]
pub trait OverlayStore: Send + Sync {
    /// List all overlays
    async fn list(&self) -> Result<Vec<Overlay>, RequestError>;

    /// Get a single overlay
    async fn get(&self, id: &str) -> Result<Overlay, RequestError>;

    /// Create an overlay, returning it with its assigned id
    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, RequestError>;

    /// Apply a partial update; only the fields present in `patch` change
    async fn update(&self, id: &str, patch: &OverlayPatch) -> Result<Overlay, RequestError>;

    /// Delete an overlay
    async fn delete(&self, id: &str) -> Result<(), RequestError>;

    /// Abort every outstanding call (used on teardown)
    fn cancel_all(&self) {}
}
