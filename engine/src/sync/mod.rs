//! Resilient synchronization of overlay edits
//!
//! This module provides:
//! - `PersistenceQueue`, the per-overlay debounced writer
//! - `SyncEvent` notifications for saved, failed and held writes
//! - `Connectivity`, the online signal the queue consults before sending

mod connectivity;
mod queue;

pub use connectivity::{Connectivity, LinkQuality, always_online};
pub use queue::{PersistenceQueue, SyncEvent};
