//! Decoded vector tiles with per-layer spatial indexes of styled features.

use std::{cmp::Ordering, collections::HashMap, fmt, sync::Arc};

use cgmath::Point2;
use geozero::GeozeroDatasource;
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;

use crate::{
    config::Config,
    coords::{TileCoords, EXTENT},
    error::TileError,
    style::{LayerType, StyleRule, Styler},
    util::math::envelope_from_points,
};

pub mod feature_processor;
pub mod tile_parser;

use feature_processor::{FeatureCollector, RawFeature};
use tile_parser::TileParser;

/// Color of features whose style rule does not define one.
const FALLBACK_COLOR: u8 = 9;

pub type Properties = HashMap<String, PropertyValue>;

/// A feature property value as found in a vector tile.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl PropertyValue {
    /// Empty strings, `0`, `NaN` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::String(string) => !string.is_empty(),
            PropertyValue::Number(number) => *number != 0.0 && !number.is_nan(),
            PropertyValue::Bool(boolean) => *boolean,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    /// Strict equality: values of different types never compare equal.
    pub fn eq_json(&self, literal: &Value) -> bool {
        match (self, literal) {
            (PropertyValue::String(a), Value::String(b)) => a == b,
            (PropertyValue::Number(a), Value::Number(b)) => b.as_f64() == Some(*a),
            (PropertyValue::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }

    /// Numbers compare with numbers and strings with strings.
    pub fn partial_cmp_json(&self, literal: &Value) -> Option<Ordering> {
        match (self, literal) {
            (PropertyValue::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
            (PropertyValue::Number(a), Value::Number(b)) => a.partial_cmp(&b.as_f64()?),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(string) => f.write_str(string),
            PropertyValue::Number(number) => write!(f, "{number}"),
            PropertyValue::Bool(boolean) => write!(f, "{boolean}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Line,
    Fill,
    Symbol,
}

impl FeatureKind {
    fn from_layer_type(layer_type: LayerType) -> Option<Self> {
        match layer_type {
            LayerType::Line => Some(FeatureKind::Line),
            LayerType::Fill => Some(FeatureKind::Fill),
            LayerType::Symbol => Some(FeatureKind::Symbol),
            LayerType::Background | LayerType::Other => None,
        }
    }
}

/// A styled feature in tile-local coordinates (`0..extent`).
#[derive(Debug, Clone)]
pub struct Feature {
    pub source_layer: String,
    pub kind: FeatureKind,
    /// A single ring for lines and symbols, the outer ring followed by its holes for fills.
    pub rings: Vec<Vec<Point2<f64>>>,
    pub color: u8,
    pub label: Option<String>,
    pub sort_key: Option<f64>,
    pub style: Arc<StyleRule>,
    /// Bounding box of the first ring.
    pub bounds: AABB<[f64; 2]>,
}

/// Entry of a layer's spatial index.
#[derive(Debug, Clone)]
pub struct IndexedFeature(pub Arc<Feature>);

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.0.bounds
    }
}

#[derive(Debug)]
pub struct Layer {
    pub extent: u32,
    index: RTree<IndexedFeature>,
}

impl Layer {
    fn new(extent: u32, features: Vec<IndexedFeature>) -> Self {
        Self {
            extent,
            index: RTree::bulk_load(features),
        }
    }

    /// Features whose bounding box intersects `envelope`, borders included.
    pub fn query<'a>(&'a self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = &'a Arc<Feature>> + 'a {
        self.index
            .locate_in_envelope_intersecting(envelope)
            .map(|indexed| &indexed.0)
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct Tile {
    coords: TileCoords,
    layers: HashMap<String, Layer>,
}

impl Tile {
    /// Decodes, styles and indexes a raw (optionally gzipped) vector tile.
    ///
    /// Malformed geometry does not fail the tile: it is logged and the tile ends up without
    /// layers.
    pub fn load(
        coords: TileCoords,
        data: &[u8],
        styler: &Styler,
        config: &Config,
    ) -> Result<Self, TileError> {
        let tile = TileParser::parse(data)?;

        let layers = match Self::build_layers(tile, styler, config) {
            Ok(layers) => layers,
            Err(e) => {
                log::warn!("discarding geometry of tile {coords}: {e}");
                HashMap::new()
            }
        };

        log::debug!("loaded tile {coords} with {} layers", layers.len());
        Ok(Self { coords, layers })
    }

    fn build_layers(
        tile: geozero::mvt::Tile,
        styler: &Styler,
        config: &Config,
    ) -> Result<HashMap<String, Layer>, TileError> {
        let mut layers = HashMap::new();
        for mut layer in tile.layers {
            if !layer.features.iter().all(TileParser::is_well_formed) {
                return Err(TileError::MalformedGeometry { layer: layer.name });
            }
            let mut collector = FeatureCollector::new();
            layer.process(&mut collector)?;

            let extent = layer.extent.unwrap_or(EXTENT);
            let features = collector
                .into_features()
                .into_iter()
                .flat_map(|raw| style_feature(&layer.name, raw, styler, config))
                .map(|feature| IndexedFeature(Arc::new(feature)))
                .collect();
            layers.insert(layer.name, Layer::new(extent, features));
        }
        Ok(layers)
    }

    pub fn coords(&self) -> TileCoords {
        self.coords
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn feature_count(&self) -> usize {
        self.layers.values().map(Layer::len).sum()
    }
}

fn label_of(properties: &Properties, language: &str) -> Option<String> {
    let localized = format!("name_{language}");
    let label = [localized.as_str(), "name_en", "name", "house_num"]
        .into_iter()
        .filter_map(|key| properties.get(key))
        .find(|value| value.is_truthy())
        .map(ToString::to_string);
    label
}

fn sort_key_of(properties: &Properties) -> Option<f64> {
    ["localrank", "scalerank"]
        .into_iter()
        .filter_map(|key| properties.get(key))
        .find(|value| value.is_truthy())
        .and_then(PropertyValue::as_f64)
}

/// Turns a decoded feature into styled features. Fills keep one feature per polygon, lines
/// and symbols get one feature per part.
fn style_feature(source_layer: &str, raw: RawFeature, styler: &Styler, config: &Config) -> Vec<Feature> {
    let RawFeature {
        geometry_type,
        parts,
        mut properties,
    } = raw;
    properties.insert(
        "$type".to_string(),
        PropertyValue::String(geometry_type.as_str().to_string()),
    );

    let Some(style) = styler.style_for(source_layer, &properties) else {
        return Vec::new();
    };
    let Some(kind) = FeatureKind::from_layer_type(style.layer_type) else {
        return Vec::new();
    };

    let label = match kind {
        FeatureKind::Symbol => label_of(&properties, &config.language),
        _ => None,
    };
    let sort_key = sort_key_of(&properties);
    let color = style.color.unwrap_or(FALLBACK_COLOR);

    let feature_rings: Vec<Vec<Vec<Point2<f64>>>> = match kind {
        FeatureKind::Fill => parts,
        FeatureKind::Line | FeatureKind::Symbol => {
            parts.into_iter().flatten().map(|ring| vec![ring]).collect()
        }
    };

    feature_rings
        .into_iter()
        .filter_map(|rings| {
            let bounds = envelope_from_points(rings.first()?.iter().copied())?;
            Some(Feature {
                source_layer: source_layer.to_string(),
                kind,
                rings,
                color,
                label: label.clone(),
                sort_key,
                style: style.clone(),
                bounds,
            })
        })
        .collect()
}
