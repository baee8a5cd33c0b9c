//! Input-modality profiles and geometry bounds

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::PointerKind;
use crate::store::{Position, Size};

/// Upper bound of either position axis; the overlay's top-left never passes it
pub const POSITION_MAX: f64 = 90.0;

pub fn clamp_position(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, POSITION_MAX)
    }
}

pub fn clamp_point(position: Position) -> Position {
    Position::new(clamp_position(position.x), clamp_position(position.y))
}

/// Allowed overlay size range in percentage units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBounds {
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    pub max_height: f64,
}

impl SizeBounds {
    pub const DESKTOP: SizeBounds = SizeBounds {
        min_width: 5.0,
        max_width: 60.0,
        min_height: 3.0,
        max_height: 40.0,
    };

    pub const MOBILE: SizeBounds = SizeBounds {
        min_width: 8.0,
        max_width: 50.0,
        min_height: 5.0,
        max_height: 40.0,
    };

    pub fn clamp(&self, size: Size) -> Size {
        let clamp_axis = |v: f64, min: f64, max: f64| if v.is_nan() { min } else { v.clamp(min, max) };
        Size::new(
            clamp_axis(size.width, self.min_width, self.max_width),
            clamp_axis(size.height, self.min_height, self.max_height),
        )
    }

    pub fn contains(&self, size: Size) -> bool {
        (self.min_width..=self.max_width).contains(&size.width)
            && (self.min_height..=self.max_height).contains(&size.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "desktop" => Some(DeviceClass::Desktop),
            "mobile" | "touch" => Some(DeviceClass::Mobile),
            _ => None,
        }
    }

    pub fn bounds(self) -> SizeBounds {
        match self {
            DeviceClass::Desktop => SizeBounds::DESKTOP,
            DeviceClass::Mobile => SizeBounds::MOBILE,
        }
    }
}

/// How a pointer modality maps onto the gesture machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputProfile {
    /// Hold time before a stationary contact starts dragging
    pub long_press: Duration,
    /// Press on the body drags at once (mouse)
    pub immediate_drag: bool,
    /// Resize handles are hit-testable
    pub uses_handles: bool,
    /// Quick second tap toggles selection
    pub double_tap: bool,
    /// Selection lapses after a quiet period
    pub auto_deselect: bool,
}

impl InputProfile {
    pub const TOUCH: InputProfile = InputProfile {
        long_press: Duration::from_millis(200),
        immediate_drag: false,
        uses_handles: false,
        double_tap: true,
        auto_deselect: true,
    };

    pub const PEN: InputProfile = InputProfile {
        long_press: Duration::from_millis(150),
        immediate_drag: false,
        uses_handles: true,
        double_tap: true,
        auto_deselect: true,
    };

    pub const MOUSE: InputProfile = InputProfile {
        long_press: Duration::from_millis(150),
        immediate_drag: true,
        uses_handles: true,
        double_tap: false,
        auto_deselect: false,
    };
}

/// Timing and bounds shared by every machine in an editor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSettings {
    pub touch: InputProfile,
    pub pen: InputProfile,
    pub mouse: InputProfile,
    pub double_tap_window: Duration,
    pub auto_deselect_after: Duration,
    pub bounds: SizeBounds,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self::for_device(DeviceClass::Desktop)
    }
}

impl GestureSettings {
    pub fn for_device(device: DeviceClass) -> Self {
        Self {
            touch: InputProfile::TOUCH,
            pen: InputProfile::PEN,
            mouse: InputProfile::MOUSE,
            double_tap_window: Duration::from_millis(300),
            auto_deselect_after: Duration::from_secs(3),
            bounds: device.bounds(),
        }
    }

    pub fn profile(&self, kind: PointerKind) -> InputProfile {
        match kind {
            PointerKind::Touch => self.touch,
            PointerKind::Pen => self.pen,
            PointerKind::Mouse => self.mouse,
        }
    }
}
