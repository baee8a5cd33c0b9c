//! Typed style overrides
//!
//! Styles are an ordered list of `(property, value)` pairs. Resolution walks
//! layers from lowest to highest precedence and the last layer to set a
//! property wins. On the wire a style is a flat JSON object keyed by the CSS
//! property name. Properties the renderer does not know are kept as
//! `StyleKey::Other` and values keep their JSON type, so a style read from
//! the store is written back unchanged. Null values are treated as unset.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::types::OverlayKind;

/// Style properties the renderer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleProperty {
    Color,
    BackgroundColor,
    FontSize,
    FontWeight,
    TextAlign,
    TextShadow,
    BoxShadow,
    Padding,
    BorderRadius,
    Opacity,
}

impl StyleProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleProperty::Color => "color",
            StyleProperty::BackgroundColor => "backgroundColor",
            StyleProperty::FontSize => "fontSize",
            StyleProperty::FontWeight => "fontWeight",
            StyleProperty::TextAlign => "textAlign",
            StyleProperty::TextShadow => "textShadow",
            StyleProperty::BoxShadow => "boxShadow",
            StyleProperty::Padding => "padding",
            StyleProperty::BorderRadius => "borderRadius",
            StyleProperty::Opacity => "opacity",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "color" => StyleProperty::Color,
            "backgroundColor" => StyleProperty::BackgroundColor,
            "fontSize" => StyleProperty::FontSize,
            "fontWeight" => StyleProperty::FontWeight,
            "textAlign" => StyleProperty::TextAlign,
            "textShadow" => StyleProperty::TextShadow,
            "boxShadow" => StyleProperty::BoxShadow,
            "padding" => StyleProperty::Padding,
            "borderRadius" => StyleProperty::BorderRadius,
            "opacity" => StyleProperty::Opacity,
            _ => return None,
        })
    }
}

/// Key of one style entry: a property the renderer understands, or any other
/// CSS property name carried through untouched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleKey {
    Known(StyleProperty),
    Other(String),
}

impl StyleKey {
    pub fn parse(name: &str) -> Self {
        match StyleProperty::parse(name) {
            Some(property) => StyleKey::Known(property),
            None => StyleKey::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StyleKey::Known(property) => property.as_str(),
            StyleKey::Other(name) => name,
        }
    }
}

impl From<StyleProperty> for StyleKey {
    fn from(property: StyleProperty) -> Self {
        StyleKey::Known(property)
    }
}

/// Ordered list of style overrides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    from = "IndexMap<String, serde_json::Value>",
    into = "IndexMap<String, serde_json::Value>"
)]
pub struct StyleOverrides {
    entries: Vec<(StyleKey, serde_json::Value)>,
}

impl StyleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StyleOverrides::set`]
    pub fn with(
        mut self,
        key: impl Into<StyleKey>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Set an entry, replacing an earlier value in place
    pub fn set(&mut self, key: impl Into<StyleKey>, value: impl Into<serde_json::Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: impl Into<StyleKey>) -> Option<&serde_json::Value> {
        let key = key.into();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// String value of an entry, if it holds one
    pub fn get_str(&self, key: impl Into<StyleKey>) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StyleKey, &serde_json::Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Computed defaults a renderer applies before any stored overrides
    pub fn defaults_for(kind: OverlayKind) -> Self {
        match kind {
            OverlayKind::Text => Self::new()
                .with(StyleProperty::Color, "#ffffff")
                .with(StyleProperty::FontSize, "16px")
                .with(StyleProperty::FontWeight, "normal")
                .with(StyleProperty::TextAlign, "left"),
            OverlayKind::Logo => Self::new().with(StyleProperty::Opacity, 1),
        }
    }
}

/// Flatten layers ordered from lowest to highest precedence
pub fn resolve_style(layers: &[&StyleOverrides]) -> StyleOverrides {
    let mut resolved = StyleOverrides::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            resolved.set(key.clone(), value.clone());
        }
    }
    resolved
}

impl From<IndexMap<String, serde_json::Value>> for StyleOverrides {
    fn from(raw: IndexMap<String, serde_json::Value>) -> Self {
        let mut style = StyleOverrides::new();
        for (name, value) in raw {
            if value.is_null() {
                debug!("Ignoring null style property: {}", name);
                continue;
            }
            let key = StyleKey::parse(&name);
            if let StyleKey::Other(name) = &key {
                trace!("Keeping unrecognized style property: {}", name);
            }
            style.set(key, value);
        }
        style
    }
}

impl From<StyleOverrides> for IndexMap<String, serde_json::Value> {
    fn from(style: StyleOverrides) -> Self {
        style
            .entries
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}
