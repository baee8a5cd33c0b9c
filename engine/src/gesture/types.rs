//! Gesture vocabulary: pointers, modes, inputs and the effects a machine emits

use serde::{Deserialize, Serialize};

use crate::geometry::{DevicePoint, RelativePoint};
use crate::store::OverlayPatch;

/// Platform pointer/touch identifier
pub type PointerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

/// The eight resize handles drawn around a selected overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::N,
        ResizeHandle::Ne,
        ResizeHandle::E,
        ResizeHandle::Se,
        ResizeHandle::S,
        ResizeHandle::Sw,
        ResizeHandle::W,
        ResizeHandle::Nw,
    ];

    /// Which edge moves on each axis: -1 for west/north, 1 for east/south, 0 for none
    pub fn axes(self) -> (i8, i8) {
        match self {
            ResizeHandle::N => (0, -1),
            ResizeHandle::Ne => (1, -1),
            ResizeHandle::E => (1, 0),
            ResizeHandle::Se => (1, 1),
            ResizeHandle::S => (0, 1),
            ResizeHandle::Sw => (-1, 1),
            ResizeHandle::W => (-1, 0),
            ResizeHandle::Nw => (-1, -1),
        }
    }

    pub fn is_corner(self) -> bool {
        let (h, v) = self.axes();
        h != 0 && v != 0
    }

    /// West and north handles shift the position to keep the opposite edge fixed
    pub fn moves_origin(self) -> bool {
        let (h, v) = self.axes();
        h < 0 || v < 0
    }
}

/// Where on the overlay a pointer went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HitTarget {
    #[default]
    Body,
    Handle(ResizeHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeGrip {
    Pinch,
    Handle(ResizeHandle),
}

/// Interaction mode of a single overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Selected,
    Dragging,
    Resizing(ResizeGrip),
}

impl Mode {
    /// Every mode except `Idle` implies the overlay is selected
    pub fn is_selected(self) -> bool {
        !matches!(self, Mode::Idle)
    }

    pub fn is_manipulating(self) -> bool {
        matches!(self, Mode::Dragging | Mode::Resizing(_))
    }
}

/// One raw input routed to a single overlay's machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down {
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

impl PointerInput {
    pub fn pointer(&self) -> PointerId {
        match *self {
            PointerInput::Down { pointer, .. }
            | PointerInput::Move { pointer, .. }
            | PointerInput::Up { pointer }
            | PointerInput::Cancel { pointer } => pointer,
        }
    }
}

/// A live touch or pointer owned by one machine, in percentage space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerContact {
    pub id: PointerId,
    pub kind: PointerKind,
    pub start: RelativePoint,
    pub current: RelativePoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    DragStart,
    PinchStart,
}

/// Fire-and-forget tactile feedback
pub trait Haptics: Send + Sync {
    fn pulse(&self, kind: HapticKind);
}

/// Output of a machine step, applied by the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEffect {
    /// Committed geometry change to hand to the persistence queue
    Persist(OverlayPatch),
    Haptic(HapticKind),
    ModeChanged { from: Mode, to: Mode },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_handles_move_both_axes() {
        for handle in ResizeHandle::ALL {
            let (h, v) = handle.axes();
            assert_eq!(handle.is_corner(), h != 0 && v != 0);
        }
        assert!(ResizeHandle::Nw.moves_origin());
        assert!(ResizeHandle::Ne.moves_origin());
        assert!(!ResizeHandle::Se.moves_origin());
    }

    #[test]
    fn test_mode_selection() {
        assert!(!Mode::Idle.is_selected());
        assert!(Mode::Resizing(ResizeGrip::Pinch).is_selected());
        assert!(Mode::Dragging.is_manipulating());
        assert!(!Mode::Selected.is_manipulating());
    }
}
