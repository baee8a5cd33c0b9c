//! Debounced persistence queue
//!
//! Coalesces bursts of geometry edits into one partial update per overlay.
//! Each overlay has at most one debounce timer: a spawned task sleeping for
//! the quiet period. A newer edit aborts the timer, merges its fields into
//! the pending patch and starts a fresh one. Timers carry a generation so a
//! timer that wakes after being superseded flushes nothing.
//!
//! Failed writes are not retried here and nothing is rolled back. The patch
//! is remembered as unsaved and a [`SyncEvent::Failed`] is broadcast so the
//! operator can retry with [`PersistenceQueue::resend_unsaved`]. While the
//! link is down, flushes are held and replayed once it comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use metrics::counter;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connectivity::{Connectivity, always_online};
use crate::config::PersistenceConfig;
use crate::request::RequestError;
use crate::store::{OverlayId, OverlayPatch, OverlayStore};

/// Capacity of the sync event channel; slow subscribers miss old events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Outcome of a flushed update, broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Saved { id: OverlayId },
    Failed { id: OverlayId, error: RequestError },
    /// The link was down; the patch is kept for replay
    Held { id: OverlayId },
}

struct PendingUpdate {
    patch: OverlayPatch,
    generation: u64,
    timer: JoinHandle<()>,
}

struct QueueInner {
    store: Arc<dyn OverlayStore>,
    debounce: Duration,
    connectivity: watch::Receiver<Connectivity>,
    pending: DashMap<OverlayId, PendingUpdate>,
    in_flight: DashMap<OverlayId, usize>,
    unsaved: DashMap<OverlayId, OverlayPatch>,
    held: DashMap<OverlayId, OverlayPatch>,
    events: broadcast::Sender<SyncEvent>,
    generation: AtomicU64,
}

#[derive(Clone)]
pub struct PersistenceQueue {
    inner: Arc<QueueInner>,
}

impl PersistenceQueue {
    pub fn new(store: Arc<dyn OverlayStore>) -> Self {
        Self::with_config(store, &PersistenceConfig::default(), always_online())
    }

    pub fn with_config(
        store: Arc<dyn OverlayStore>,
        config: &PersistenceConfig,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(QueueInner {
                store,
                debounce: config.debounce,
                connectivity,
                pending: DashMap::new(),
                in_flight: DashMap::new(),
                unsaved: DashMap::new(),
                held: DashMap::new(),
                events,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Queue an edit behind the debounce window. Must be called inside a
    /// tokio runtime.
    pub fn schedule(&self, id: &str, patch: OverlayPatch) {
        if patch.is_empty() {
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;

        match self.inner.pending.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let pending = entry.get_mut();
                pending.timer.abort();
                pending.patch.merge(patch);
                pending.generation = generation;
                pending.timer = self.spawn_timer(id.to_string(), generation);
                counter!("overlay_updates_coalesced_total").increment(1);
            }
            Entry::Vacant(entry) => {
                let timer = self.spawn_timer(id.to_string(), generation);
                entry.insert(PendingUpdate {
                    patch,
                    generation,
                    timer,
                });
            }
        }
    }

    /// Apply an edit. With `immediate` the edit, merged over anything still
    /// pending, is sent before this returns; otherwise it is debounced.
    pub async fn apply(&self, id: &str, patch: OverlayPatch, immediate: bool) {
        if !immediate {
            self.schedule(id, patch);
            return;
        }

        let patch = match self.inner.pending.remove(id) {
            Some((_, pending)) => {
                pending.timer.abort();
                let mut merged = pending.patch;
                merged.merge(patch);
                merged
            }
            None => patch,
        };
        if !patch.is_empty() {
            self.send(id, patch).await;
        }
    }

    /// Whether an edit is waiting for its window or on the wire
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.pending.contains_key(id) || self.inner.in_flight.contains_key(id)
    }

    /// Whether the last write of some field failed or is held offline
    pub fn is_unsaved(&self, id: &str) -> bool {
        self.inner.unsaved.contains_key(id) || self.inner.held.contains_key(id)
    }

    pub fn unsaved_ids(&self) -> Vec<OverlayId> {
        let mut ids: Vec<OverlayId> = self
            .inner
            .unsaved
            .iter()
            .map(|e| e.key().clone())
            .chain(self.inner.held.iter().map(|e| e.key().clone()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// Send the fields that failed to save for `id` again. Returns whether
    /// there was anything to send.
    pub async fn resend_unsaved(&self, id: &str) -> bool {
        let failed = self.inner.unsaved.remove(id).map(|(_, p)| p);
        let held = self.inner.held.remove(id).map(|(_, p)| p);
        let patch = match (failed, held) {
            (Some(mut failed), Some(held)) => {
                failed.merge(held);
                failed
            }
            (failed, held) => match failed.or(held) {
                Some(patch) => patch,
                None => return false,
            },
        };
        info!("Resending unsaved changes for overlay {}", id);
        self.send(id, patch).await;
        true
    }

    /// Send every patch held while offline. Returns how many were sent.
    pub async fn replay_held(&self) -> usize {
        let ids: Vec<OverlayId> = self.inner.held.iter().map(|e| e.key().clone()).collect();
        let sends = ids.into_iter().filter_map(|id| {
            let (id, patch) = self.inner.held.remove(&id)?;
            Some(async move { self.send(&id, patch).await })
        });
        let replayed = join_all(sends).await.len();
        if replayed > 0 {
            info!("Replayed {} held overlay updates", replayed);
        }
        replayed
    }

    /// Replay held patches whenever connectivity turns usable again
    pub fn spawn_reconnect_replay(&self) -> JoinHandle<()> {
        let queue = self.clone();
        let mut connectivity = self.inner.connectivity.clone();
        tokio::spawn(async move {
            while connectivity.changed().await.is_ok() {
                let usable = connectivity.borrow_and_update().is_usable();
                if usable {
                    queue.replay_held().await;
                }
            }
        })
    }

    /// Send every pending edit now. Returns how many were flushed.
    pub async fn flush_all(&self) -> usize {
        let ids: Vec<OverlayId> = self.inner.pending.iter().map(|e| e.key().clone()).collect();
        let sends = ids.into_iter().filter_map(|id| {
            let (id, pending) = self.inner.pending.remove(&id)?;
            pending.timer.abort();
            Some(async move { self.send(&id, pending.patch).await })
        });
        join_all(sends).await.len()
    }

    /// Release every timer and cancel in-flight writes. Edits that never
    /// left are kept as unsaved.
    pub fn shutdown(&self) {
        let mut dropped = 0;
        self.inner.pending.retain(|id, pending| {
            pending.timer.abort();
            self.inner
                .unsaved
                .entry(id.clone())
                .or_default()
                .merge(pending.patch);
            dropped += 1;
            false
        });
        self.inner.store.cancel_all();
        if dropped > 0 {
            warn!("Shutdown discarded {} pending overlay updates", dropped);
        }
    }

    fn spawn_timer(&self, id: OverlayId, generation: u64) -> JoinHandle<()> {
        let queue = self.clone();
        let delay = self.inner.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.flush_generation(&id, generation).await;
        })
    }

    async fn flush_generation(&self, id: &str, generation: u64) {
        let Some((_, pending)) = self
            .inner
            .pending
            .remove_if(id, |_, p| p.generation == generation)
        else {
            return;
        };
        self.send(id, pending.patch).await;
    }

    fn is_online(&self) -> bool {
        self.inner.connectivity.borrow().is_usable()
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    async fn send(&self, id: &str, patch: OverlayPatch) {
        if !self.is_online() {
            debug!("Offline, holding update for overlay {}", id);
            self.inner
                .held
                .entry(id.to_string())
                .or_default()
                .merge(patch);
            counter!("overlay_updates_held_total").increment(1);
            self.emit(SyncEvent::Held { id: id.to_string() });
            return;
        }

        *self.inner.in_flight.entry(id.to_string()).or_insert(0) += 1;
        counter!("overlay_updates_sent_total").increment(1);
        let result = self.inner.store.update(id, &patch).await;
        self.inner.in_flight.remove_if_mut(id, |_, count| {
            *count -= 1;
            *count == 0
        });

        match result {
            Ok(_) => {
                debug!("Persisted overlay {}", id);
                self.clear_saved_fields(id, &patch);
                self.emit(SyncEvent::Saved { id: id.to_string() });
            }
            Err(error) => {
                warn!("Failed to persist overlay {}: {}", id, error);
                counter!("overlay_updates_failed_total").increment(1);
                self.inner
                    .unsaved
                    .entry(id.to_string())
                    .or_default()
                    .merge(patch);
                self.emit(SyncEvent::Failed {
                    id: id.to_string(),
                    error,
                });
            }
        }
    }

    /// Forget unsaved fields that a successful write just covered
    fn clear_saved_fields(&self, id: &str, saved: &OverlayPatch) {
        self.inner.unsaved.remove_if_mut(id, |_, unsaved| {
            if saved.position.is_some() {
                unsaved.position = None;
            }
            if saved.size.is_some() {
                unsaved.size = None;
            }
            unsaved.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Position, Size};
    use crate::sync::connectivity::LinkQuality;
    use crate::test_utils::{MockStore, settle};

    fn queue(store: &Arc<MockStore>) -> PersistenceQueue {
        PersistenceQueue::new(store.clone())
    }

    fn pos(x: f64, y: f64) -> OverlayPatch {
        OverlayPatch::position(Position::new(x, y))
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_last_value() {
        let store = Arc::new(MockStore::new());
        let queue = queue(&store);

        queue.schedule("a", pos(1.0, 1.0));
        sleep_ms(200).await;
        queue.schedule("a", pos(2.0, 2.0));
        sleep_ms(200).await;
        queue.schedule("a", pos(3.0, 3.0));

        sleep_ms(499).await;
        assert_eq!(store.update_count(), 0);
        assert!(queue.is_pending("a"));

        sleep_ms(2).await;
        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].patch, pos(3.0, 3.0));
        assert!(!queue.is_pending("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fields_merge_within_window() {
        let store = Arc::new(MockStore::new());
        let queue = queue(&store);

        queue.schedule("a", pos(5.0, 5.0));
        queue.schedule("a", OverlayPatch::size(Size::new(20.0, 10.0)));
        sleep_ms(600).await;

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].patch,
            OverlayPatch {
                position: Some(Position::new(5.0, 5.0)),
                size: Some(Size::new(20.0, 10.0)),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlays_debounce_independently() {
        let store = Arc::new(MockStore::new());
        let queue = queue(&store);

        queue.schedule("a", pos(1.0, 1.0));
        sleep_ms(300).await;
        queue.schedule("b", pos(2.0, 2.0));
        sleep_ms(201).await;

        assert_eq!(store.updates().len(), 1);
        assert_eq!(store.updates()[0].id, "a");
        sleep_ms(300).await;
        assert_eq!(store.updates().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_sends_before_returning_and_absorbs_pending() {
        let store = Arc::new(MockStore::new());
        let queue = queue(&store);

        queue.schedule("a", pos(4.0, 4.0));
        queue
            .apply("a", OverlayPatch::size(Size::new(30.0, 20.0)), true)
            .await;

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].patch.position, Some(Position::new(4.0, 4.0)));
        assert_eq!(updates[0].patch.size, Some(Size::new(30.0, 20.0)));

        // The aborted timer never fires a second write
        sleep_ms(1000).await;
        assert_eq!(store.update_count(), 1);
        assert!(!queue.is_pending("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_covers_in_flight() {
        let store = Arc::new(MockStore::with_latency(Duration::from_millis(300)));
        let queue = queue(&store);

        queue.schedule("a", pos(1.0, 1.0));
        sleep_ms(550).await;
        assert_eq!(store.update_count(), 1);
        assert!(queue.is_pending("a"));

        sleep_ms(300).await;
        assert!(!queue.is_pending("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_surfaced_not_retried() {
        let store = Arc::new(MockStore::new());
        store.fail_next(RequestError::Http {
            status: 500,
            message: "boom".into(),
        });
        let queue = queue(&store);
        let mut events = queue.subscribe();

        queue.schedule("a", pos(7.0, 7.0));
        sleep_ms(600).await;

        assert!(!queue.is_pending("a"));
        assert!(queue.is_unsaved("a"));
        assert!(matches!(
            events.try_recv(),
            Ok(SyncEvent::Failed { ref id, .. }) if id == "a"
        ));

        sleep_ms(10_000).await;
        assert_eq!(store.update_count(), 1);

        assert!(queue.resend_unsaved("a").await);
        assert_eq!(store.update_count(), 2);
        assert_eq!(store.updates()[1].patch, pos(7.0, 7.0));
        assert!(!queue.is_unsaved("a"));
        assert_eq!(
            events.try_recv(),
            Ok(SyncEvent::Saved { id: "a".to_string() })
        );
        assert!(!queue.resend_unsaved("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_success_clears_only_saved_fields() {
        let store = Arc::new(MockStore::new());
        store.fail_next(RequestError::Timeout);
        let queue = queue(&store);

        queue.apply("a", pos(1.0, 1.0), true).await;
        queue
            .apply("a", OverlayPatch::size(Size::new(10.0, 10.0)), true)
            .await;
        assert!(queue.is_unsaved("a"));

        queue.apply("a", pos(2.0, 2.0), true).await;
        assert!(!queue.is_unsaved("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_flush_is_held_and_replayed() {
        let store = Arc::new(MockStore::new());
        let (tx, rx) = watch::channel(Connectivity::offline());
        let queue = PersistenceQueue::with_config(store.clone(), &PersistenceConfig::default(), rx);
        let replay = queue.spawn_reconnect_replay();
        let mut events = queue.subscribe();

        queue.schedule("a", pos(3.0, 3.0));
        sleep_ms(600).await;
        assert_eq!(store.update_count(), 0);
        assert!(queue.is_unsaved("a"));
        assert_eq!(events.try_recv(), Ok(SyncEvent::Held { id: "a".to_string() }));

        tx.send(Connectivity::online(LinkQuality::Poor)).unwrap();
        settle().await;

        assert_eq!(store.update_count(), 1);
        assert_eq!(store.updates()[0].patch, pos(3.0, 3.0));
        assert!(!queue.is_unsaved("a"));
        replay.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_timers_and_cancels() {
        let store = Arc::new(MockStore::new());
        let queue = queue(&store);

        queue.schedule("a", pos(1.0, 1.0));
        queue.shutdown();
        sleep_ms(1000).await;

        assert_eq!(store.update_count(), 0);
        assert!(store.was_cancelled());
        assert!(!queue.is_pending("a"));
        assert!(queue.is_unsaved("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_sends_everything_now() {
        let store = Arc::new(MockStore::new());
        let queue = queue(&store);

        queue.schedule("a", pos(1.0, 1.0));
        queue.schedule("b", pos(2.0, 2.0));
        assert_eq!(queue.flush_all().await, 2);
        assert_eq!(store.update_count(), 2);

        sleep_ms(1000).await;
        assert_eq!(store.update_count(), 2);
    }
}
