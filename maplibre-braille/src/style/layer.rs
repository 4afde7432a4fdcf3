//! Style layer description.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::style::filter::Filter;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Background,
    Fill,
    Line,
    Symbol,
    /// Layer types that are not rendered in a terminal, e.g. `raster` or `circle`.
    #[default]
    #[serde(other)]
    Other,
}

/// A paint property: either a flat value or a zoom function.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PaintValue {
    Stops {
        stops: Vec<(f64, Value)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base: Option<f64>,
    },
    Constant(Value),
}

impl PaintValue {
    /// The flat value, or the value of the first stop of a zoom function.
    ///
    /// Interpolating between stops is not supported.
    pub fn first_value(&self) -> Option<&Value> {
        match self {
            PaintValue::Constant(value) => Some(value),
            PaintValue::Stops { stops, .. } => stops.first().map(|(_, value)| value),
        }
    }
}

/// A layer entry of a style document, after constants and `ref`s are resolved.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StyleLayer {
    pub id: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default)]
    pub layer_type: LayerType,
    #[serde(rename = "source-layer", default)]
    pub source_layer: Option<String>,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub paint: HashMap<String, PaintValue>,
    #[serde(default)]
    pub minzoom: Option<f64>,
    #[serde(default)]
    pub maxzoom: Option<f64>,
}

/// A compiled style layer.
#[derive(Debug, Clone, Default)]
pub struct StyleRule {
    pub id: String,
    pub source_layer: Option<String>,
    pub layer_type: LayerType,
    pub paint: HashMap<String, PaintValue>,
    pub filter: Filter,
    pub minzoom: Option<f64>,
    pub maxzoom: Option<f64>,
    /// Terminal color of `line-color`, `fill-color` or `text-color`, in that priority.
    pub color: Option<u8>,
}

impl StyleRule {
    pub fn paint_value(&self, property: &str) -> Option<&Value> {
        self.paint.get(property).and_then(PaintValue::first_value)
    }

    pub fn line_width(&self) -> f64 {
        self.paint_value("line-width")
            .and_then(Value::as_f64)
            .unwrap_or(1.0)
    }

    /// Whether the rule applies at `zoom`. Zoom bounds of `0` count as unset.
    pub fn is_visible_at(&self, zoom: f64) -> bool {
        let below = self.minzoom.is_some_and(|min| min != 0.0 && zoom < min);
        let above = self.maxzoom.is_some_and(|max| max != 0.0 && zoom > max);
        !(below || above)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{LayerType, PaintValue, StyleLayer, StyleRule};

    #[test]
    fn test_deserialize_layer() {
        let layer: StyleLayer = serde_json::from_value(json!({
            "id": "road_major",
            "type": "line",
            "source-layer": "road",
            "paint": {
                "line-color": "#ffffff",
                "line-width": {"base": 1.4, "stops": [[6, 0.5], [20, 30]]}
            }
        }))
        .unwrap();

        assert_eq!(layer.layer_type, LayerType::Line);
        assert_eq!(layer.source_layer.as_deref(), Some("road"));
        assert_eq!(
            layer.paint["line-width"].first_value(),
            Some(&json!(0.5))
        );
        assert!(matches!(
            layer.paint["line-color"],
            PaintValue::Constant(_)
        ));
    }

    #[test]
    fn test_unknown_layer_type() {
        let layer: StyleLayer =
            serde_json::from_value(json!({"id": "hillshade", "type": "raster"})).unwrap();
        assert_eq!(layer.layer_type, LayerType::Other);
    }

    #[test]
    fn test_zoom_range() {
        let rule = StyleRule {
            minzoom: Some(4.0),
            maxzoom: Some(10.0),
            ..StyleRule::default()
        };
        assert!(!rule.is_visible_at(3.9));
        assert!(rule.is_visible_at(4.0));
        assert!(rule.is_visible_at(10.0));
        assert!(!rule.is_visible_at(10.1));

        let unbounded = StyleRule {
            minzoom: Some(0.0),
            maxzoom: Some(0.0),
            ..StyleRule::default()
        };
        assert!(unbounded.is_visible_at(0.0));
        assert!(unbounded.is_visible_at(18.0));
        assert!(StyleRule::default().is_visible_at(7.0));
    }
}
