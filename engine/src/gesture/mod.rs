//! Direct-manipulation gesture engine
//!
//! This module provides:
//! - `GestureMachine`, the per-overlay pointer/touch state machine
//! - `InputProfile` and `GestureSettings` tuning each pointer modality
//! - Clamping policy for positions and sizes

mod machine;
mod profile;
mod types;

pub use machine::{
    GestureMachine, InteractionState, drag_position, pinch_size, resize_from_handle,
};
pub use profile::{
    DeviceClass, GestureSettings, InputProfile, POSITION_MAX, SizeBounds, clamp_point,
    clamp_position,
};
pub use types::{
    GestureEffect, HapticKind, Haptics, HitTarget, Mode, PointerContact, PointerId, PointerInput,
    PointerKind, ResizeGrip, ResizeHandle,
};
