//! Overlay store module
//!
//! This module provides:
//! - The overlay data model and the store's response envelope
//! - `OverlayStore` trait with an HTTP implementation
//! - `LocalOverlayStore`, an in-memory store served by `store_routes`

mod http;
mod local;
mod routes;
mod service;
mod style;
mod types;

pub use http::HttpOverlayStore;
pub use local::{LocalOverlayStore, OverlayUpdate, StoreError};
pub use routes::{StoreAppState, store_routes};
pub use service::OverlayStore;
pub use style::{StyleKey, StyleOverrides, StyleProperty, resolve_style};
pub use types::{
    Envelope, Geometry, NewOverlay, Overlay, OverlayId, OverlayKind, OverlayPatch, Position, Size,
};
