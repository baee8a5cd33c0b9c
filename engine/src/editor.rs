//! Overlay editor: routes input to gesture machines and edits to the queue
//!
//! The editor owns one `GestureMachine` per overlay and is driven from a
//! single task. Pointer downs capture the pointer for the overlay they hit,
//! so moves and releases keep reaching it even once the pointer leaves the
//! overlay. Machine timers are serviced from the same loop by sleeping until
//! the earliest deadline.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::geometry::{ContainerRect, DevicePoint};
use crate::gesture::{
    GestureEffect, GestureMachine, GestureSettings, Haptics, HitTarget, Mode, PointerId,
    PointerInput, PointerKind,
};
use crate::request::RequestError;
use crate::store::{Geometry, HttpOverlayStore, Overlay, OverlayId, OverlayPatch};
use crate::sync::{Connectivity, PersistenceQueue};

/// Raw input as delivered by the platform
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Down {
        overlay: OverlayId,
        pointer: PointerId,
        kind: PointerKind,
        at: DevicePoint,
        target: HitTarget,
    },
    Move {
        pointer: PointerId,
        at: DevicePoint,
    },
    Up {
        pointer: PointerId,
    },
    Cancel {
        pointer: PointerId,
    },
}

/// A gesture effect tagged with the overlay that produced it
pub type EditorEffect = (OverlayId, GestureEffect);

pub struct OverlayEditor {
    machines: IndexMap<OverlayId, GestureMachine>,
    captures: HashMap<PointerId, OverlayId>,
    container: ContainerRect,
    settings: GestureSettings,
    queue: PersistenceQueue,
    haptics: Option<Arc<dyn Haptics>>,
    replay: Option<JoinHandle<()>>,
}

impl OverlayEditor {
    pub fn new(queue: PersistenceQueue, settings: GestureSettings, container: ContainerRect) -> Self {
        Self {
            machines: IndexMap::new(),
            captures: HashMap::new(),
            container,
            settings,
            queue,
            haptics: None,
            replay: None,
        }
    }

    /// Editor backed by the HTTP store at `config.api_base_url`.
    ///
    /// Must be called inside a tokio runtime: it spawns the task that
    /// replays held writes when `connectivity` reports the link is back.
    pub fn connect(
        config: &Config,
        container: ContainerRect,
        connectivity: watch::Receiver<Connectivity>,
    ) -> Result<Self, RequestError> {
        let store = HttpOverlayStore::connect(config)?;
        let queue =
            PersistenceQueue::with_config(Arc::new(store), &config.persistence, connectivity);
        let mut editor = Self::new(queue, config.gesture_settings(), container);
        editor.replay = Some(editor.queue.spawn_reconnect_replay());
        Ok(editor)
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    pub fn queue(&self) -> &PersistenceQueue {
        &self.queue
    }

    /// Track these overlays, adopting fresh geometry for known ones
    pub fn load(&mut self, overlays: &[Overlay]) {
        for overlay in overlays {
            self.insert(overlay);
        }
        debug!("Editor tracking {} overlays", self.machines.len());
    }

    pub fn insert(&mut self, overlay: &Overlay) {
        match self.machines.get_mut(&overlay.id) {
            Some(machine) => {
                machine.sync_geometry(overlay.geometry());
            }
            None => {
                self.machines.insert(
                    overlay.id.clone(),
                    GestureMachine::for_overlay(overlay, self.settings),
                );
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.captures.retain(|_, captured| captured != id);
        self.machines.shift_remove(id).is_some()
    }

    pub fn set_container(&mut self, container: ContainerRect) {
        self.container = container;
    }

    pub fn container(&self) -> ContainerRect {
        self.container
    }

    pub fn mode(&self, id: &str) -> Option<Mode> {
        self.machines.get(id).map(|m| m.mode())
    }

    pub fn geometry(&self, id: &str) -> Option<Geometry> {
        self.machines.get(id).map(|m| m.geometry())
    }

    /// First overlay that is currently selected
    pub fn selected(&self) -> Option<&OverlayId> {
        self.machines
            .iter()
            .find(|(_, m)| m.mode().is_selected())
            .map(|(id, _)| id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.queue.is_pending(id)
    }

    /// Select an overlay without a gesture, deselecting the rest
    pub fn select(&mut self, id: &str) -> Vec<EditorEffect> {
        if !self.machines.contains_key(id) {
            return Vec::new();
        }
        let mut effects = self.deselect_others(id);
        if let Some(machine) = self.machines.get_mut(id) {
            effects.extend(machine.select().into_iter().map(|e| (id.to_string(), e)));
        }
        effects
    }

    /// Route one input event observed at `now` and apply its effects
    pub fn dispatch(&mut self, event: InputEvent, now: Instant) -> Vec<EditorEffect> {
        let (id, input, mut effects) = match event {
            InputEvent::Down {
                overlay,
                pointer,
                kind,
                at,
                target,
            } => {
                if !self.machines.contains_key(&overlay) {
                    trace!("Down on unknown overlay {}", overlay);
                    return Vec::new();
                }
                if self.captures.contains_key(&pointer) {
                    trace!("Pointer {} already captured", pointer);
                    return Vec::new();
                }
                let effects = self.deselect_others(&overlay);
                self.captures.insert(pointer, overlay.clone());
                let input = PointerInput::Down {
                    pointer,
                    kind,
                    at,
                    target,
                };
                (overlay, input, effects)
            }
            InputEvent::Move { pointer, at } => {
                let Some(id) = self.captures.get(&pointer).cloned() else {
                    return Vec::new();
                };
                (id, PointerInput::Move { pointer, at }, Vec::new())
            }
            InputEvent::Up { pointer } => {
                let Some(id) = self.captures.remove(&pointer) else {
                    return Vec::new();
                };
                (id, PointerInput::Up { pointer }, Vec::new())
            }
            InputEvent::Cancel { pointer } => {
                let Some(id) = self.captures.remove(&pointer) else {
                    return Vec::new();
                };
                (id, PointerInput::Cancel { pointer }, Vec::new())
            }
        };

        if let Some(machine) = self.machines.get_mut(&id) {
            let produced = machine.handle(input, &self.container, now);
            effects.extend(produced.into_iter().map(|e| (id.clone(), e)));
        }
        self.apply_effects(&effects);
        effects
    }

    /// Fire every machine timer due at `now`
    pub fn poll_timers(&mut self, now: Instant) -> Vec<EditorEffect> {
        let mut effects = Vec::new();
        for (id, machine) in self.machines.iter_mut() {
            effects.extend(machine.poll_timers(now).into_iter().map(|e| (id.clone(), e)));
        }
        self.apply_effects(&effects);
        effects
    }

    /// Earliest timer deadline across all overlays
    pub fn next_deadline(&self) -> Option<Instant> {
        self.machines.values().filter_map(|m| m.next_deadline()).min()
    }

    /// Apply a programmatic geometry edit and persist it right away.
    /// Returns the resulting geometry, or `None` for an unknown overlay.
    pub async fn set_geometry(&mut self, id: &str, patch: OverlayPatch) -> Option<Geometry> {
        let machine = self.machines.get_mut(id)?;
        let clamped = machine.apply_programmatic(patch);
        let geometry = machine.geometry();
        self.queue.apply(id, clamped, true).await;
        Some(geometry)
    }

    /// Process input until the sender side closes
    pub async fn run(&mut self, mut events: mpsc::Receiver<InputEvent>) {
        info!("Overlay editor running with {} overlays", self.machines.len());
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.dispatch(event, Instant::now());
                    }
                    None => break,
                },
                _ = wait_for(deadline) => {
                    self.poll_timers(Instant::now());
                }
            }
        }
        info!("Input closed, overlay editor stopped");
    }

    /// Send every pending edit without waiting for its window
    pub async fn flush(&self) -> usize {
        self.queue.flush_all().await
    }

    /// Release all timers, contacts and in-flight writes
    pub fn shutdown(&mut self) {
        for machine in self.machines.values_mut() {
            machine.reset();
        }
        self.captures.clear();
        if let Some(replay) = self.replay.take() {
            replay.abort();
        }
        self.queue.shutdown();
        info!("Overlay editor shut down");
    }

    fn deselect_others(&mut self, keep: &str) -> Vec<EditorEffect> {
        let mut effects = Vec::new();
        for (id, machine) in self.machines.iter_mut() {
            if id != keep {
                effects.extend(machine.deselect().into_iter().map(|e| (id.clone(), e)));
            }
        }
        effects
    }

    fn apply_effects(&self, effects: &[EditorEffect]) {
        for (id, effect) in effects {
            match effect {
                GestureEffect::Persist(patch) => self.queue.schedule(id, *patch),
                GestureEffect::Haptic(kind) => {
                    if let Some(haptics) = &self.haptics {
                        haptics.pulse(*kind);
                    }
                }
                GestureEffect::ModeChanged { .. } => {}
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
