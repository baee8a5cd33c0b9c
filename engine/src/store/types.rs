//! Overlay data model and the store's response envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::style::StyleOverrides;
use crate::request::RequestError;

/// Overlay identifier as assigned by the store
pub type OverlayId = String;

/// What an overlay renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Text,
    Logo,
}

/// Top-left corner in percentage space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Extent in percentage space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

/// The spatial part of an overlay, which is all the gesture engine edits
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geometry {
    pub position: Position,
    pub size: Size,
}

impl Geometry {
    pub fn new(position: Position, size: Size) -> Self {
        Self { position, size }
    }
}

/// An overlay as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(alias = "_id")]
    pub id: OverlayId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    /// Literal text, or an image reference for logos
    pub content: String,
    pub position: Position,
    pub size: Size,
    #[serde(default, skip_serializing_if = "StyleOverrides::is_empty")]
    pub style: StyleOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Overlay {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.position, self.size)
    }

    /// Style after layering the overlay's own overrides over the kind defaults
    pub fn resolved_style(&self) -> StyleOverrides {
        super::style::resolve_style(&[&StyleOverrides::defaults_for(self.kind), &self.style])
    }
}

/// Fields supplied when creating an overlay; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: OverlayKind,
    pub content: String,
    pub position: Position,
    pub size: Size,
    #[serde(default, skip_serializing_if = "StyleOverrides::is_empty")]
    pub style: StyleOverrides,
}

/// Partial geometry update: only the fields that changed are sent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OverlayPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

impl OverlayPatch {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            size: None,
        }
    }

    pub fn size(size: Size) -> Self {
        Self {
            position: None,
            size: Some(size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.size.is_none()
    }

    /// Fold a newer patch into this one; the newer value wins per field
    pub fn merge(&mut self, newer: OverlayPatch) {
        if newer.position.is_some() {
            self.position = newer.position;
        }
        if newer.size.is_some() {
            self.size = newer.size;
        }
    }

    pub fn applied_to(&self, geometry: Geometry) -> Geometry {
        Geometry {
            position: self.position.unwrap_or(geometry.position),
            size: self.size.unwrap_or(geometry.size),
        }
    }
}

/// Uniform response envelope used by every store endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            count: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            count: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Unwrap the payload of a successful envelope
    pub fn into_data(self) -> Result<T, RequestError> {
        if !self.success {
            return Err(RequestError::Rejected(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "unspecified store error".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| RequestError::Decode("envelope is missing data".to_string()))
    }

    /// Check a successful envelope that carries no payload
    pub fn into_ack(self) -> Result<(), RequestError> {
        if self.success {
            Ok(())
        } else {
            Err(RequestError::Rejected(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "unspecified store error".to_string()),
            ))
        }
    }
}

impl Envelope<()> {
    /// Acknowledgement without a payload
    pub fn ack() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: None,
            count: None,
        }
    }
}
