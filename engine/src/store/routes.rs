//! HTTP route handlers for the overlay store API

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::local::{LocalOverlayStore, OverlayUpdate, StoreError};
use super::types::{Envelope, NewOverlay, Overlay};

/// Application state for the store routes
#[derive(Clone)]
pub struct StoreAppState {
    pub store: Arc<LocalOverlayStore>,
    pub started_at: Instant,
}

impl StoreAppState {
    pub fn new(store: Arc<LocalOverlayStore>) -> Self {
        Self {
            store,
            started_at: Instant::now(),
        }
    }
}

impl StoreError {
    fn status(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidId(_) | StoreError::EmptyBody | StoreError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut envelope = Envelope::<()>::failure(self.to_string());
        if let StoreError::Validation(detail) = &self {
            envelope = envelope.with_message(detail.clone());
        }
        (status, Json(envelope)).into_response()
    }
}

/// Decode a JSON request body, treating an empty body or `{}` as missing
fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, StoreError> {
    if body.is_empty() {
        return Err(StoreError::EmptyBody);
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| StoreError::Validation(e.to_string()))?;
    if value.as_object().is_some_and(|o| o.is_empty()) || value.is_null() {
        return Err(StoreError::EmptyBody);
    }
    serde_json::from_value(value).map_err(|e| StoreError::Validation(e.to_string()))
}

/// GET /api/overlays
pub async fn list_overlays(State(state): State<StoreAppState>) -> Json<Envelope<Vec<Overlay>>> {
    let overlays = state.store.list().await;
    let count = overlays.len();
    Json(Envelope::ok(overlays).with_count(count))
}

/// GET /api/overlays/:id
pub async fn get_overlay(
    State(state): State<StoreAppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Overlay>>, StoreError> {
    let overlay = state.store.get(&id).await.map_err(|e| {
        tracing::debug!("Failed to get overlay {}: {}", id, e);
        e
    })?;
    Ok(Json(Envelope::ok(overlay)))
}

/// POST /api/overlays
pub async fn create_overlay(
    State(state): State<StoreAppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<Overlay>>), StoreError> {
    let new: NewOverlay = parse_body(&body)?;
    let overlay = state.store.create(new).await;
    tracing::info!("Created overlay {}", overlay.id);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(overlay).with_message("Overlay created successfully")),
    ))
}

/// PUT /api/overlays/:id
pub async fn update_overlay(
    State(state): State<StoreAppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Envelope<Overlay>>, StoreError> {
    LocalOverlayStore::validate_id(&id)?;
    let update: OverlayUpdate = parse_body(&body)?;
    let overlay = state.store.update(&id, update).await?;
    Ok(Json(
        Envelope::ok(overlay).with_message("Overlay updated successfully"),
    ))
}

/// DELETE /api/overlays/:id
pub async fn delete_overlay(
    State(state): State<StoreAppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, StoreError> {
    state.store.delete(&id).await?;
    tracing::info!("Deleted overlay {}", id);
    Ok(Json(
        Envelope::ack().with_message("Overlay deleted successfully"),
    ))
}

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: &'static str,
    pub version: &'static str,
    pub overlays: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/health
pub async fn health(State(state): State<StoreAppState>) -> Json<Envelope<HealthData>> {
    Json(
        Envelope::ok(HealthData {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            overlays: state.store.count().await,
            uptime_seconds: state.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        })
        .with_message("Overlay store is running"),
    )
}

/// POST /api/init-sample-data
pub async fn init_sample_data(State(state): State<StoreAppState>) -> Json<Envelope<()>> {
    let count = state.store.seed_samples().await;
    Json(
        Envelope::ack()
            .with_message(format!("Initialized {} sample overlays", count))
            .with_count(count),
    )
}

/// DELETE /api/cleanup-overlays
pub async fn cleanup_overlays(State(state): State<StoreAppState>) -> Json<Envelope<()>> {
    let removed = state.store.cleanup_placeholder_content().await;
    if removed > 0 {
        tracing::info!("Removed {} overlays with placeholder content", removed);
    }
    Json(
        Envelope::ack()
            .with_message(format!("Removed {} overlays with placeholder content", removed))
            .with_count(removed),
    )
}

async fn not_found() -> (StatusCode, Json<Envelope<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::failure("Endpoint not found")),
    )
}

/// Build overlay store API routes (mounted under `/api`)
pub fn store_routes(state: StoreAppState) -> Router {
    Router::new()
        .route("/overlays", get(list_overlays).post(create_overlay))
        .route(
            "/overlays/:id",
            get(get_overlay).put(update_overlay).delete(delete_overlay),
        )
        .route("/health", get(health))
        .route("/init-sample-data", post(init_sample_data))
        .route("/cleanup-overlays", delete(cleanup_overlays))
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<LocalOverlayStore>) {
        let store = Arc::new(LocalOverlayStore::new());
        (store_routes(StoreAppState::new(store.clone())), store)
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_returns_201_with_envelope() {
        let (app, store) = app();
        let body = r#"{"type":"text","content":"Hi","position":{"x":5,"y":5},"size":{"width":20,"height":10}}"#;

        let (status, json) = send(app, Method::POST, "/overlays", body).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["type"], "text");
        assert!(json["data"]["id"].is_string());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_id_is_400() {
        let (app, _) = app();
        let (status, json) = send(app, Method::GET, "/overlays/nope", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid overlay ID format");
    }

    #[tokio::test]
    async fn test_unknown_overlay_is_404() {
        let (app, _) = app();
        let uri = format!("/overlays/{}", uuid::Uuid::new_v4());
        let (status, json) = send(app, Method::DELETE, &uri, "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Overlay not found");
    }

    #[tokio::test]
    async fn test_empty_update_is_400() {
        let (app, store) = app();
        store.seed_samples().await;
        let id = store.list().await[0].id.clone();

        let (status, json) = send(app, Method::PUT, &format!("/overlays/{}", id), "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No data provided");
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let (app, store) = app();
        store.seed_samples().await;
        let before = store.list().await[0].clone();

        let (status, json) = send(
            app,
            Method::PUT,
            &format!("/overlays/{}", before.id),
            r#"{"position":{"x":40,"y":41}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["position"]["x"], 40.0);
        assert_eq!(json["data"]["size"]["width"], before.size.width);
        assert_eq!(json["data"]["content"], before.content.as_str());
    }

    #[tokio::test]
    async fn test_unknown_endpoint_falls_back() {
        let (app, _) = app();
        let (status, json) = send(app, Method::GET, "/nothing-here", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_list_reports_count() {
        let (app, store) = app();
        store.seed_samples().await;
        let (status, json) = send(app, Method::GET, "/overlays", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 3);
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
    }
}
