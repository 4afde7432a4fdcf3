//! Compiles a style document into per source-layer rule lists.

use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    error::StyleError,
    style::{
        filter::Filter,
        layer::{LayerType, StyleLayer, StyleRule},
    },
    tile::Properties,
    util::color::hex2ansi256,
};

/// Keys a layer inherits from the layer named by its `ref`.
const INHERITED_KEYS: [&str; 5] = ["type", "source-layer", "minzoom", "maxzoom", "filter"];

/// Paint properties that give a feature its color, highest priority first.
const COLOR_PROPERTIES: [&str; 3] = ["line-color", "fill-color", "text-color"];

#[derive(Deserialize, Debug, Default)]
struct StyleDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    constants: Option<Map<String, Value>>,
    #[serde(default)]
    layers: Vec<Value>,
}

/// Holds the compiled style: rules indexed by id and by source-layer.
#[derive(Debug, Default)]
pub struct Styler {
    name: Option<String>,
    rules: Vec<Arc<StyleRule>>,
    by_id: HashMap<String, Arc<StyleRule>>,
    by_source_layer: HashMap<String, Vec<Arc<StyleRule>>>,
    background_color: Option<u8>,
}

impl Styler {
    pub fn from_json(json: &str) -> Result<Self, StyleError> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn new(document: Value) -> Result<Self, StyleError> {
        let StyleDocument {
            name,
            constants,
            mut layers,
        } = serde_json::from_value(document)?;

        if let Some(constants) = &constants {
            for layer in &mut layers {
                replace_constants(constants, layer);
            }
        }

        let mut styler = Styler {
            name,
            ..Styler::default()
        };
        let mut resolved: HashMap<String, Map<String, Value>> = HashMap::new();

        for mut layer in layers {
            if let Value::Object(object) = &mut layer {
                let referent = object
                    .get("ref")
                    .and_then(Value::as_str)
                    .and_then(|reference| resolved.get(reference));
                if let Some(referent) = referent {
                    inherit(object, referent);
                }
            }

            let layer: StyleLayer = serde_json::from_value(layer)?;
            if let Value::Object(object) = serde_json::to_value(&layer)? {
                resolved.insert(layer.id.clone(), object);
            }

            let rule = Arc::new(compile(layer)?);
            if rule.id == "background" {
                styler.background_color = background_color(&rule)?;
            }
            if let Some(source_layer) = &rule.source_layer {
                styler
                    .by_source_layer
                    .entry(source_layer.clone())
                    .or_default()
                    .push(rule.clone());
            }
            styler.by_id.insert(rule.id.clone(), rule.clone());
            styler.rules.push(rule);
        }

        log::info!(
            "style `{}` compiled with {} layers",
            styler.name().unwrap_or("unnamed"),
            styler.rules.len()
        );

        Ok(styler)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rules(&self) -> &[Arc<StyleRule>] {
        &self.rules
    }

    pub fn style_by_id(&self, id: &str) -> Option<&Arc<StyleRule>> {
        self.by_id.get(id)
    }

    /// Terminal color of the `background` layer's `background-color`.
    pub fn background_color(&self) -> Option<u8> {
        self.background_color
    }

    /// The first rule of `source_layer` whose filter matches `properties`.
    pub fn style_for(&self, source_layer: &str, properties: &Properties) -> Option<&Arc<StyleRule>> {
        self.by_source_layer
            .get(source_layer)?
            .iter()
            .find(|rule| rule.filter.evaluate(properties))
    }
}

/// Replaces every string starting with `@` by the constant of that name.
fn replace_constants(constants: &Map<String, Value>, node: &mut Value) {
    match node {
        Value::String(string) if string.starts_with('@') => {
            *node = match constants.get(string.as_str()) {
                Some(constant) => constant.clone(),
                None => {
                    log::warn!("style references undefined constant `{string}`");
                    Value::Null
                }
            };
        }
        Value::Array(values) => {
            for value in values {
                replace_constants(constants, value);
            }
        }
        Value::Object(object) => {
            for value in object.values_mut() {
                replace_constants(constants, value);
            }
        }
        _ => {}
    }
}

fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null | Value::Bool(false)) => true,
        Some(Value::String(string)) => string.is_empty(),
        Some(Value::Number(number)) => number.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

fn inherit(layer: &mut Map<String, Value>, referent: &Map<String, Value>) {
    for key in INHERITED_KEYS {
        if is_unset(layer.get(key)) && !is_unset(referent.get(key)) {
            if let Some(value) = referent.get(key) {
                layer.insert(key.to_string(), value.clone());
            }
        }
    }
}

fn color_of(layer: &str, value: &Value) -> Result<u8, StyleError> {
    let color = value.as_str().unwrap_or_default();
    hex2ansi256(color).map_err(|source| StyleError::Color {
        layer: layer.to_string(),
        source,
    })
}

fn compile(layer: StyleLayer) -> Result<StyleRule, StyleError> {
    let mut rule = StyleRule {
        filter: Filter::compile(layer.filter.as_ref()),
        id: layer.id,
        source_layer: layer.source_layer,
        layer_type: layer.layer_type,
        paint: layer.paint,
        minzoom: layer.minzoom,
        maxzoom: layer.maxzoom,
        color: None,
    };

    let color = COLOR_PROPERTIES
        .iter()
        .find_map(|property| rule.paint_value(property).filter(|value| !value.is_null()));
    rule.color = color.map(|value| color_of(&rule.id, value)).transpose()?;
    Ok(rule)
}

fn background_color(rule: &StyleRule) -> Result<Option<u8>, StyleError> {
    if rule.layer_type != LayerType::Background {
        return Ok(None);
    }
    rule.paint_value("background-color")
        .filter(|value| !value.is_null())
        .map(|value| color_of(&rule.id, value))
        .transpose()
}
