//! Overlay Engine Library
//!
//! Direct-manipulation gestures for video overlays and the resilient layer
//! that persists the resulting edits to the overlay store.

pub mod config;
pub mod editor;
pub mod geometry;
pub mod gesture;
pub mod request;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use editor::{EditorEffect, InputEvent, OverlayEditor};
pub use gesture::{GestureEffect, GestureMachine, GestureSettings, Mode};
pub use request::{RequestClient, RequestError};
pub use store::{
    HttpOverlayStore, LocalOverlayStore, Overlay, OverlayPatch, OverlayStore, StoreAppState,
    store_routes,
};
pub use sync::{Connectivity, PersistenceQueue, SyncEvent};
