//! Per-overlay gesture state machine
//!
//! A `GestureMachine` turns the raw pointer stream for one overlay into mode
//! transitions and committed geometry changes. It never sleeps and never
//! reads the clock: every step takes the current instant from the caller, and
//! pending timers are exposed through `next_deadline` so the owner can wake
//! up and call `poll_timers`.
//!
//! Touch and pen wait for a long-press before dragging and use two contacts
//! to pinch-resize. Mouse presses drag immediately and resize through the
//! handles drawn around a selected overlay.

use indexmap::IndexMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::profile::{GestureSettings, InputProfile, SizeBounds, clamp_point, clamp_position};
use super::types::{
    GestureEffect, HapticKind, HitTarget, Mode, PointerContact, PointerId, PointerInput,
    PointerKind, ResizeGrip, ResizeHandle,
};
use crate::geometry::{ContainerRect, RelativePoint, distance, to_relative};
use crate::store::{Geometry, Overlay, OverlayId, OverlayPatch, Position, Size};

/// Below this inter-contact distance a pinch has no usable reference
const MIN_PINCH_DISTANCE: f64 = 1e-6;

/// Snapshot taken when a drag or resize begins
#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    geometry: Geometry,
    point: RelativePoint,
    pointer: Option<PointerId>,
    distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TapRecord {
    started_at: Instant,
    mode_before: Mode,
}

/// Interaction state of one overlay
#[derive(Debug, Default)]
pub struct InteractionState {
    mode: Mode,
    contacts: IndexMap<PointerId, PointerContact>,
    anchor: Option<Anchor>,
    last_tap: Option<TapRecord>,
    toggled: bool,
    /// Whether the overlay was already selected when the first contact of
    /// the current gesture went down
    selected_at_down: bool,
    profile: Option<InputProfile>,
    long_press_at: Option<Instant>,
    auto_deselect_at: Option<Instant>,
}

impl InteractionState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn contacts(&self) -> impl Iterator<Item = &PointerContact> {
        self.contacts.values()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    fn clear_timers(&mut self) {
        self.long_press_at = None;
        self.auto_deselect_at = None;
    }
}

pub struct GestureMachine {
    overlay: OverlayId,
    geometry: Geometry,
    settings: GestureSettings,
    state: InteractionState,
}

impl GestureMachine {
    pub fn new(overlay: impl Into<OverlayId>, geometry: Geometry, settings: GestureSettings) -> Self {
        Self {
            overlay: overlay.into(),
            geometry,
            settings,
            state: InteractionState::default(),
        }
    }

    pub fn for_overlay(overlay: &Overlay, settings: GestureSettings) -> Self {
        Self::new(overlay.id.clone(), overlay.geometry(), settings)
    }

    pub fn overlay_id(&self) -> &OverlayId {
        &self.overlay
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Feed one pointer input observed at `now`
    pub fn handle(
        &mut self,
        input: PointerInput,
        container: &ContainerRect,
        now: Instant,
    ) -> Vec<GestureEffect> {
        let mut effects = Vec::new();
        match input {
            PointerInput::Down {
                pointer,
                kind,
                at,
                target,
            } => self.on_down(pointer, kind, to_relative(at, container), target, now, &mut effects),
            PointerInput::Move { pointer, at } => {
                self.on_move(pointer, to_relative(at, container), &mut effects)
            }
            PointerInput::Up { pointer } | PointerInput::Cancel { pointer } => {
                self.on_release(pointer, now, &mut effects)
            }
        }
        effects
    }

    /// Fire every timer whose deadline is at or before `now`
    pub fn poll_timers(&mut self, now: Instant) -> Vec<GestureEffect> {
        let mut effects = Vec::new();

        if let Some(at) = self.state.long_press_at
            && now >= at
        {
            self.state.long_press_at = None;
            let sole_contact = (self.state.contacts.len() == 1)
                .then(|| self.state.contacts.values().next().copied())
                .flatten();
            if let Some(contact) = sole_contact
                && !self.state.mode.is_manipulating()
            {
                debug!("Long-press on overlay {} starts drag", self.overlay);
                self.begin_drag(contact.id, contact.current, true, &mut effects);
            }
        }

        if let Some(at) = self.state.auto_deselect_at
            && now >= at
        {
            self.state.auto_deselect_at = None;
            if self.state.mode == Mode::Selected && self.state.contacts.is_empty() {
                self.set_mode(Mode::Idle, &mut effects);
            }
        }

        effects
    }

    /// Earliest armed timer, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.state.long_press_at, self.state.auto_deselect_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Select without a gesture (e.g. picked from a list)
    pub fn select(&mut self) -> Vec<GestureEffect> {
        let mut effects = Vec::new();
        if self.state.mode == Mode::Idle {
            self.set_mode(Mode::Selected, &mut effects);
        }
        effects
    }

    /// Drop the selection unless a gesture is holding the overlay
    pub fn deselect(&mut self) -> Vec<GestureEffect> {
        let mut effects = Vec::new();
        if self.state.contacts.is_empty() && self.state.mode == Mode::Selected {
            self.state.clear_timers();
            self.set_mode(Mode::Idle, &mut effects);
        }
        effects
    }

    /// Apply a non-gesture edit. Returns the patch after clamping.
    pub fn apply_programmatic(&mut self, patch: OverlayPatch) -> OverlayPatch {
        let clamped = OverlayPatch {
            position: patch.position.map(clamp_point),
            size: patch.size.map(|s| self.settings.bounds.clamp(s)),
        };
        self.geometry = clamped.applied_to(self.geometry);
        clamped
    }

    /// Adopt geometry loaded from the store. Ignored mid-gesture.
    pub fn sync_geometry(&mut self, geometry: Geometry) -> bool {
        if self.state.mode.is_manipulating() {
            trace!("Overlay {} busy, ignoring remote geometry", self.overlay);
            return false;
        }
        self.geometry = geometry;
        true
    }

    /// Return to `Idle` and release every contact and timer
    pub fn reset(&mut self) {
        self.state = InteractionState::default();
    }

    fn set_mode(&mut self, to: Mode, effects: &mut Vec<GestureEffect>) {
        let from = self.state.mode;
        if from != to {
            debug!("Overlay {}: {:?} -> {:?}", self.overlay, from, to);
            self.state.mode = to;
            effects.push(GestureEffect::ModeChanged { from, to });
        }
    }

    fn on_down(
        &mut self,
        pointer: PointerId,
        kind: PointerKind,
        point: RelativePoint,
        target: HitTarget,
        now: Instant,
        effects: &mut Vec<GestureEffect>,
    ) {
        if self.state.contacts.contains_key(&pointer) {
            trace!("Duplicate down for pointer {}", pointer);
            return;
        }

        let profile = self.settings.profile(kind);
        let contact = PointerContact {
            id: pointer,
            kind,
            start: point,
            current: point,
        };
        self.state.auto_deselect_at = None;

        if !self.state.contacts.is_empty() {
            self.state.contacts.insert(pointer, contact);
            if self.state.mode == Mode::Selected && !self.state.toggled && self.pinch_capable() {
                self.begin_pinch(effects);
            }
            return;
        }

        self.state.contacts.insert(pointer, contact);
        self.state.profile = Some(profile);
        self.state.selected_at_down = self.state.mode.is_selected();

        if profile.uses_handles
            && self.state.mode.is_selected()
            && let HitTarget::Handle(handle) = target
        {
            self.begin_handle_resize(pointer, handle, point, effects);
            return;
        }

        if profile.immediate_drag {
            self.begin_drag(pointer, point, false, effects);
            return;
        }

        if profile.double_tap
            && let Some(tap) = self.state.last_tap.take()
            && now.saturating_duration_since(tap.started_at) <= self.settings.double_tap_window
        {
            self.state.long_press_at = None;
            self.state.toggled = true;
            let to = if tap.mode_before.is_selected() {
                Mode::Idle
            } else {
                Mode::Selected
            };
            debug!("Double-tap on overlay {}", self.overlay);
            self.set_mode(to, effects);
            return;
        }

        self.state.last_tap = Some(TapRecord {
            started_at: now,
            mode_before: self.state.mode,
        });
        self.state.toggled = false;
        self.state.long_press_at = Some(now + profile.long_press);
        if self.state.mode == Mode::Idle {
            self.set_mode(Mode::Selected, effects);
        }
    }

    fn on_move(&mut self, pointer: PointerId, point: RelativePoint, effects: &mut Vec<GestureEffect>) {
        let Some(contact) = self.state.contacts.get_mut(&pointer) else {
            trace!("Move from unknown pointer {}", pointer);
            return;
        };
        contact.current = point;

        match self.state.mode {
            Mode::Dragging => self.drag(pointer, point, effects),
            Mode::Resizing(ResizeGrip::Pinch) => self.pinch(effects),
            Mode::Resizing(ResizeGrip::Handle(handle)) => {
                self.resize_with_handle(pointer, handle, point, effects)
            }
            // A pinch that began at zero distance starts once the contacts separate
            Mode::Selected if !self.state.toggled && self.pinch_capable() => {
                self.begin_pinch(effects)
            }
            _ => {}
        }
    }

    fn on_release(&mut self, pointer: PointerId, now: Instant, effects: &mut Vec<GestureEffect>) {
        if self.state.contacts.shift_remove(&pointer).is_none() {
            trace!("Release from unknown pointer {}", pointer);
            return;
        }

        if !self.state.contacts.is_empty() {
            let lost_anchor = match self.state.mode {
                Mode::Resizing(ResizeGrip::Pinch) => true,
                Mode::Dragging | Mode::Resizing(ResizeGrip::Handle(_)) => self
                    .state
                    .anchor
                    .is_some_and(|a| a.pointer == Some(pointer)),
                _ => false,
            };
            if lost_anchor {
                debug!("Overlay {} gesture lost a contact", self.overlay);
                self.state.anchor = None;
                self.set_mode(Mode::Selected, effects);
            }
            return;
        }

        self.state.long_press_at = None;
        self.state.anchor = None;
        let profile = self.state.profile.take().unwrap_or(self.settings.touch);

        if self.state.toggled {
            self.state.toggled = false;
        } else {
            self.set_mode(Mode::Selected, effects);
        }

        if self.state.mode == Mode::Selected && profile.auto_deselect {
            self.state.auto_deselect_at = Some(now + self.settings.auto_deselect_after);
        }
    }

    /// Two touch contacts on an overlay that was selected before they landed
    fn pinch_capable(&self) -> bool {
        self.state.selected_at_down
            && self.state.contacts.len() == 2
            && self
                .state
                .contacts
                .values()
                .all(|c| !self.settings.profile(c.kind).immediate_drag)
    }

    fn contact_pair(&self) -> Option<(RelativePoint, RelativePoint)> {
        if self.state.contacts.len() != 2 {
            return None;
        }
        let mut points = self.state.contacts.values().map(|c| c.current);
        Some((points.next()?, points.next()?))
    }

    fn begin_drag(
        &mut self,
        pointer: PointerId,
        point: RelativePoint,
        haptic: bool,
        effects: &mut Vec<GestureEffect>,
    ) {
        self.state.long_press_at = None;
        self.state.anchor = Some(Anchor {
            geometry: self.geometry,
            point,
            pointer: Some(pointer),
            distance: 0.0,
        });
        self.set_mode(Mode::Dragging, effects);
        if haptic {
            effects.push(GestureEffect::Haptic(HapticKind::DragStart));
        }
    }

    fn begin_pinch(&mut self, effects: &mut Vec<GestureEffect>) {
        self.state.long_press_at = None;
        let Some((a, b)) = self.contact_pair() else {
            return;
        };
        let span = distance(a, b);
        if span <= MIN_PINCH_DISTANCE {
            trace!("Pinch on overlay {} deferred, contacts coincide", self.overlay);
            return;
        }

        self.state.anchor = Some(Anchor {
            geometry: self.geometry,
            point: a,
            pointer: None,
            distance: span,
        });
        self.set_mode(Mode::Resizing(ResizeGrip::Pinch), effects);
        effects.push(GestureEffect::Haptic(HapticKind::PinchStart));
    }

    fn begin_handle_resize(
        &mut self,
        pointer: PointerId,
        handle: ResizeHandle,
        point: RelativePoint,
        effects: &mut Vec<GestureEffect>,
    ) {
        self.state.long_press_at = None;
        self.state.anchor = Some(Anchor {
            geometry: self.geometry,
            point,
            pointer: Some(pointer),
            distance: 0.0,
        });
        self.set_mode(Mode::Resizing(ResizeGrip::Handle(handle)), effects);
    }

    fn drag(&mut self, pointer: PointerId, point: RelativePoint, effects: &mut Vec<GestureEffect>) {
        let Some(anchor) = self.state.anchor.filter(|a| a.pointer == Some(pointer)) else {
            return;
        };
        let (dx, dy) = point.delta_from(anchor.point);
        let position = drag_position(anchor.geometry.position, dx, dy);
        if position != self.geometry.position {
            self.geometry.position = position;
            effects.push(GestureEffect::Persist(OverlayPatch::position(position)));
        }
    }

    fn pinch(&mut self, effects: &mut Vec<GestureEffect>) {
        let (Some(anchor), Some((a, b))) = (self.state.anchor, self.contact_pair()) else {
            return;
        };
        let scale = distance(a, b) / anchor.distance;
        let size = pinch_size(anchor.geometry.size, scale, &self.settings.bounds);
        if size != self.geometry.size {
            self.geometry.size = size;
            effects.push(GestureEffect::Persist(OverlayPatch::size(size)));
        }
    }

    fn resize_with_handle(
        &mut self,
        pointer: PointerId,
        handle: ResizeHandle,
        point: RelativePoint,
        effects: &mut Vec<GestureEffect>,
    ) {
        let Some(anchor) = self.state.anchor.filter(|a| a.pointer == Some(pointer)) else {
            return;
        };
        let (dx, dy) = point.delta_from(anchor.point);
        let next = resize_from_handle(anchor.geometry, handle, dx, dy, &self.settings.bounds);

        let patch = OverlayPatch {
            position: (next.position != self.geometry.position).then_some(next.position),
            size: (next.size != self.geometry.size).then_some(next.size),
        };
        if !patch.is_empty() {
            self.geometry = next;
            effects.push(GestureEffect::Persist(patch));
        }
    }
}

/// Anchor position moved by a percentage-space delta, clamped per axis
pub fn drag_position(anchor: Position, dx: f64, dy: f64) -> Position {
    clamp_point(Position::new(anchor.x + dx, anchor.y + dy))
}

/// Anchor size scaled by a pinch ratio, clamped per axis
pub fn pinch_size(anchor: Size, scale: f64, bounds: &SizeBounds) -> Size {
    bounds.clamp(anchor.scaled(scale))
}

/// Geometry after dragging `handle` by (`dx`, `dy`) from `anchor`.
///
/// Corner handles scale both axes by one factor, taken from whichever axis
/// the pointer moved further in relative terms. Edge handles change one axis.
/// West and north handles keep the opposite edge fixed by shifting the
/// position.
pub fn resize_from_handle(
    anchor: Geometry,
    handle: ResizeHandle,
    dx: f64,
    dy: f64,
    bounds: &SizeBounds,
) -> Geometry {
    let (h, v) = handle.axes();
    let raw = Size::new(
        anchor.size.width + f64::from(h) * dx,
        anchor.size.height + f64::from(v) * dy,
    );
    let size = if handle.is_corner() && anchor.size.width > 0.0 && anchor.size.height > 0.0 {
        let sx = raw.width / anchor.size.width;
        let sy = raw.height / anchor.size.height;
        let scale = if (sx - 1.0).abs() >= (sy - 1.0).abs() { sx } else { sy };
        pinch_size(anchor.size, scale, bounds)
    } else {
        bounds.clamp(raw)
    };

    let x = if h < 0 {
        clamp_position(anchor.position.x + anchor.size.width - size.width)
    } else {
        anchor.position.x
    };
    let y = if v < 0 {
        clamp_position(anchor.position.y + anchor.size.height - size.height)
    } else {
        anchor.position.y
    };

    Geometry::new(Position::new(x, y), size)
}
