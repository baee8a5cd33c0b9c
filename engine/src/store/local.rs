//! In-memory overlay store
//!
//! Serves the same REST surface as the production overlay backend so the
//! engine can be exercised end to end without a database.

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::style::{StyleOverrides, StyleProperty};
use super::types::{NewOverlay, Overlay, OverlayId, OverlayKind, OverlayPatch, Position, Size};

/// Content hosts known to serve broken placeholder images
const PLACEHOLDER_HOSTS: &[&str] = &["via.placeholder.com", "picsum.photos", "httpbin.org"];

/// Errors surfaced by the local store's HTTP API
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid overlay ID format")]
    InvalidId(String),

    #[error("Overlay not found")]
    NotFound(OverlayId),

    #[error("No data provided")]
    EmptyBody,

    #[error("Validation failed")]
    Validation(String),
}

/// Full update accepted by the store: geometry plus descriptive fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayUpdate {
    #[serde(flatten)]
    pub geometry: OverlayPatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<OverlayKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleOverrides>,
}

impl OverlayUpdate {
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
            && self.name.is_none()
            && self.kind.is_none()
            && self.content.is_none()
            && self.style.is_none()
    }
}

impl From<OverlayPatch> for OverlayUpdate {
    fn from(geometry: OverlayPatch) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }
}

/// Insertion-ordered in-memory overlay collection
#[derive(Default)]
pub struct LocalOverlayStore {
    overlays: RwLock<IndexMap<OverlayId, Overlay>>,
}

impl LocalOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are UUIDs; anything else is rejected before lookup
    pub fn validate_id(id: &str) -> Result<(), StoreError> {
        Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|_| StoreError::InvalidId(id.to_string()))
    }

    pub async fn list(&self) -> Vec<Overlay> {
        self.overlays.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.overlays.read().await.len()
    }

    pub async fn get(&self, id: &str) -> Result<Overlay, StoreError> {
        Self::validate_id(id)?;
        self.overlays
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub async fn create(&self, new: NewOverlay) -> Overlay {
        let now = Utc::now();
        let overlay = Overlay {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            kind: new.kind,
            content: new.content,
            position: new.position,
            size: new.size,
            style: new.style,
            created_at: Some(now),
            updated_at: Some(now),
        };

        debug!("Created overlay {}", overlay.id);
        self.overlays
            .write()
            .await
            .insert(overlay.id.clone(), overlay.clone());
        overlay
    }

    pub async fn update(&self, id: &str, update: OverlayUpdate) -> Result<Overlay, StoreError> {
        Self::validate_id(id)?;
        if update.is_empty() {
            return Err(StoreError::EmptyBody);
        }

        let mut overlays = self.overlays.write().await;
        let overlay = overlays
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(position) = update.geometry.position {
            overlay.position = position;
        }
        if let Some(size) = update.geometry.size {
            overlay.size = size;
        }
        if let Some(name) = update.name {
            overlay.name = Some(name);
        }
        if let Some(kind) = update.kind {
            overlay.kind = kind;
        }
        if let Some(content) = update.content {
            overlay.content = content;
        }
        if let Some(style) = update.style {
            overlay.style = style;
        }
        overlay.updated_at = Some(Utc::now());

        Ok(overlay.clone())
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        Self::validate_id(id)?;
        self.overlays
            .write()
            .await
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Replace any previous sample overlays with a fresh set.
    /// Returns how many were inserted.
    pub async fn seed_samples(&self) -> usize {
        {
            let mut overlays = self.overlays.write().await;
            overlays.retain(|_, o| {
                !o.name
                    .as_deref()
                    .is_some_and(|n| n.starts_with("Sample") || n.starts_with("Test"))
            });
        }

        let samples = sample_overlays();
        let count = samples.len();
        for sample in samples {
            self.create(sample).await;
        }
        info!("Initialized {} sample overlays", count);
        count
    }

    /// Remove overlays whose content points at known placeholder hosts.
    /// Returns how many were removed.
    pub async fn cleanup_placeholder_content(&self) -> usize {
        let mut overlays = self.overlays.write().await;
        let before = overlays.len();
        overlays.retain(|_, o| {
            let content = o.content.to_lowercase();
            !PLACEHOLDER_HOSTS.iter().any(|host| content.contains(host))
        });
        before - overlays.len()
    }
}

fn sample_overlays() -> Vec<NewOverlay> {
    vec![
        NewOverlay {
            name: Some("Sample Welcome Text".to_string()),
            kind: OverlayKind::Text,
            content: "Welcome to RTSP Stream!".to_string(),
            position: Position::new(10.0, 10.0),
            size: Size::new(25.0, 8.0),
            style: StyleOverrides::new()
                .with(StyleProperty::Color, "#ffffff")
                .with(StyleProperty::FontSize, "20px")
                .with(StyleProperty::FontWeight, "bold")
                .with(StyleProperty::TextShadow, "2px 2px 4px rgba(0,0,0,0.8)")
                .with(StyleProperty::BackgroundColor, "rgba(0,0,0,0.7)")
                .with(StyleProperty::Padding, "10px")
                .with(StyleProperty::BorderRadius, "5px"),
        },
        NewOverlay {
            name: Some("Sample Logo SVG".to_string()),
            kind: OverlayKind::Logo,
            content: "data:image/svg+xml;charset=utf-8,%3Csvg%20width%3D%22120%22%20height%3D%2240%22%20xmlns%3D%22http%3A//www.w3.org/2000/svg%22%3E%3Crect%20width%3D%22120%22%20height%3D%2240%22%20fill%3D%22%231976d2%22%20rx%3D%225%22/%3E%3C/svg%3E".to_string(),
            position: Position::new(75.0, 5.0),
            size: Size::new(15.0, 5.0),
            style: StyleOverrides::new()
                .with(StyleProperty::BorderRadius, "5px")
                .with(StyleProperty::BoxShadow, "0 2px 4px rgba(0,0,0,0.3)"),
        },
        NewOverlay {
            name: Some("Sample Status Text".to_string()),
            kind: OverlayKind::Text,
            content: "LIVE".to_string(),
            position: Position::new(85.0, 85.0),
            size: Size::new(10.0, 6.0),
            style: StyleOverrides::new()
                .with(StyleProperty::Color, "#ff0000")
                .with(StyleProperty::FontSize, "16px")
                .with(StyleProperty::FontWeight, "bold")
                .with(StyleProperty::BackgroundColor, "rgba(255,255,255,0.9)")
                .with(StyleProperty::Padding, "5px 10px")
                .with(StyleProperty::BorderRadius, "15px")
                .with(StyleProperty::TextAlign, "center"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_text(content: &str) -> NewOverlay {
        NewOverlay {
            name: None,
            kind: OverlayKind::Text,
            content: content.to_string(),
            position: Position::new(10.0, 10.0),
            size: Size::new(20.0, 10.0),
            style: StyleOverrides::default(),
        }
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = LocalOverlayStore::new();
        let created = store.create(new_text("hello")).await;
        assert!(created.created_at.is_some());

        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);

        let updated = store
            .update(
                &created.id,
                OverlayPatch::position(Position::new(15.0, 15.0)).into(),
            )
            .await
            .unwrap();
        assert_eq!(updated.position, Position::new(15.0, 15.0));
        assert_eq!(updated.size, created.size);

        store.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.get(&created.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_id_and_empty_update() {
        let store = LocalOverlayStore::new();
        assert!(matches!(
            store.get("not-a-uuid").await,
            Err(StoreError::InvalidId(_))
        ));

        let created = store.create(new_text("x")).await;
        assert!(matches!(
            store.update(&created.id, OverlayUpdate::default()).await,
            Err(StoreError::EmptyBody)
        ));
    }

    #[tokio::test]
    async fn test_seed_replaces_previous_samples() {
        let store = LocalOverlayStore::new();
        store.create(new_text("mine")).await;

        assert_eq!(store.seed_samples().await, 3);
        assert_eq!(store.seed_samples().await, 3);
        assert_eq!(store.count().await, 4);
    }

    #[tokio::test]
    async fn test_cleanup_placeholder_content() {
        let store = LocalOverlayStore::new();
        store.create(new_text("https://via.placeholder.com/150")).await;
        store.create(new_text("https://PICSUM.photos/200")).await;
        store.create(new_text("LIVE")).await;

        assert_eq!(store.cleanup_placeholder_content().await, 2);
        assert_eq!(store.list().await.len(), 1);
    }
}
