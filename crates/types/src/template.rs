//! Declarative poster templates.
//!
//! Templates are read-only configuration: the renderer borrows them and never
//! writes back. Keys the model does not know about are kept in `extra` so a
//! template round-trips through this crate unchanged.

use crate::color::Color;
use crate::geometry::{Position, Size};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_true() -> bool {
    true
}

fn default_background() -> Color {
    Color::WHITE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_background", alias = "background")]
    pub background_color: Color,
}

impl Canvas {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Template family / category used by the template store.
    #[serde(default)]
    pub family: Option<String>,
    pub canvas: Canvas,
    pub components: Vec<TemplateComponent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Template {
    /// Display name, falling back to the id and then to a generic label.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("untitled")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub position: Position,
    pub size: Size,
    #[serde(default)]
    pub content: Value,
    #[serde(default = "default_true", alias = "isVisible")]
    pub visible: bool,
    #[serde(default)]
    pub style: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateComponent {
    /// String field from the content payload, e.g. `content.text`.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        match &self.content {
            Value::String(s) if key == "text" => Some(s.as_str()),
            Value::Object(map) => map.get(key).and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn style_str(&self, key: &str) -> Option<&str> {
        self.style.get(key).and_then(Value::as_str)
    }

    /// Numeric style value. Accepts plain numbers and CSS-like `"48px"` strings.
    /// Numeric style value. Values that do not fit a finite `f32` are ignored.
    pub fn style_f32(&self, key: &str) -> Option<f32> {
        let value = match self.style.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().trim_end_matches("px").trim().parse::<f32>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    pub fn style_color(&self, key: &str) -> Option<Color> {
        match self.style.get(key)? {
            Value::String(s) => Color::parse(s).ok(),
            other => serde_json::from_value(other.clone()).ok(),
        }
    }

    pub fn style_bool(&self, key: &str) -> Option<bool> {
        self.style.get(key).and_then(Value::as_bool)
    }
}
