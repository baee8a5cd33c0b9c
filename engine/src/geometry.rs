//! Coordinate mapping between device pixels and percentage space
//!
//! Overlay positions and sizes are stored as percentages of the video
//! container, so the same layout renders identically at any resolution.
//! These functions only do the spatial math: nothing here clamps, callers
//! apply their own bounds policy.

use serde::{Deserialize, Serialize};

/// Point in device (pixel) coordinates, as reported by the input system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DevicePoint {
    pub x: f64,
    pub y: f64,
}

impl DevicePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Point in percentage space (0-100 of the container's width/height)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelativePoint {
    pub x: f64,
    pub y: f64,
}

impl RelativePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Offset from `origin` to this point, per axis
    pub fn delta_from(self, origin: RelativePoint) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// Bounding box of the video container in device coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether a device point falls inside the container
    pub fn contains(&self, point: DevicePoint) -> bool {
        point.x >= self.left
            && point.x <= self.left + self.width
            && point.y >= self.top
            && point.y <= self.top + self.height
    }
}

/// Convert a device point to container-relative percentages.
///
/// Points outside the container map outside [0, 100]. A degenerate axis
/// (zero or negative extent) maps to 0.
pub fn to_relative(point: DevicePoint, rect: &ContainerRect) -> RelativePoint {
    RelativePoint {
        x: axis_to_relative(point.x - rect.left, rect.width),
        y: axis_to_relative(point.y - rect.top, rect.height),
    }
}

/// Convert container-relative percentages back to device coordinates
pub fn to_device(point: RelativePoint, rect: &ContainerRect) -> DevicePoint {
    DevicePoint {
        x: rect.left + point.x / 100.0 * rect.width,
        y: rect.top + point.y / 100.0 * rect.height,
    }
}

/// Euclidean distance between two points in percentage space
pub fn distance(a: RelativePoint, b: RelativePoint) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn axis_to_relative(offset: f64, extent: f64) -> f64 {
    if extent > 0.0 {
        offset / extent * 100.0
    } else {
        0.0
    }
}
