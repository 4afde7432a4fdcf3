//! Renderer configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per source-layer label placement overrides.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LayerConfig {
    /// Label margin in label-grid cells; falls back to [`Config::label_margin`].
    pub margin: Option<f64>,
    /// Retry a failed label placement with the generic marker.
    pub cluster: bool,
}

/// Source-layers drawn back to front from `min_zoom` upwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DrawOrder {
    pub min_zoom: f64,
    pub layers: Vec<String>,
}

/// Configuration shared read-only by every component of the renderer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Language code used to pick `name_<language>` labels.
    pub language: String,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub simplify_polylines: bool,
    /// Draw with 8-dot braille glyphs instead of block characters.
    pub use_braille: bool,
    /// Highest zoom level tiles are requested at.
    pub tile_range: u8,
    /// Size in pixels of a tile at an integer zoom.
    pub project_size: f64,
    pub label_margin: f64,
    /// Pixels beyond the viewport that are still considered on screen when clipping.
    pub tile_padding: f64,
    pub poi_marker: String,
    /// Emitted between two rows of the frame.
    pub delimiter: String,
    /// Number of decoded tiles kept by the tile repository.
    pub tile_cache_size: usize,
    pub layers: HashMap<String, LayerConfig>,
    pub draw_order: Vec<DrawOrder>,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn layer(&self, source_layer: &str) -> Option<&LayerConfig> {
        self.layers.get(source_layer)
    }

    /// Source-layers to draw at `zoom`, back to front.
    pub fn draw_order(&self, zoom: f64) -> &[String] {
        self.draw_order
            .iter()
            .filter(|bracket| bracket.min_zoom <= zoom)
            .max_by(|a, b| a.min_zoom.total_cmp(&b.min_zoom))
            .or_else(|| self.draw_order.first())
            .map_or(&[], |bracket| bracket.layers.as_slice())
    }
}

fn layer_names(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

impl Default for Config {
    fn default() -> Self {
        let layers = [
            (
                "housenum_label",
                LayerConfig {
                    margin: Some(4.0),
                    cluster: false,
                },
            ),
            (
                "poi_label",
                LayerConfig {
                    margin: Some(5.0),
                    cluster: true,
                },
            ),
            (
                "place_label",
                LayerConfig {
                    margin: None,
                    cluster: true,
                },
            ),
            (
                "state_label",
                LayerConfig {
                    margin: None,
                    cluster: true,
                },
            ),
        ]
        .into_iter()
        .map(|(name, config)| (name.to_string(), config))
        .collect();

        Config {
            language: "en".to_string(),
            max_zoom: 18.0,
            zoom_step: 0.2,
            simplify_polylines: false,
            use_braille: true,
            tile_range: 14,
            project_size: 256.0,
            label_margin: 5.0,
            tile_padding: 64.0,
            poi_marker: "◉".to_string(),
            delimiter: "\n\r".to_string(),
            tile_cache_size: 16,
            layers,
            draw_order: vec![
                DrawOrder {
                    min_zoom: 0.0,
                    layers: layer_names(&["admin", "water", "country_label", "marine_label"]),
                },
                DrawOrder {
                    min_zoom: 2.0,
                    layers: layer_names(&[
                        "landuse",
                        "water",
                        "marine_label",
                        "building",
                        "road",
                        "admin",
                        "country_label",
                        "state_label",
                        "water_label",
                        "place_label",
                        "rail_station_label",
                        "poi_label",
                        "road_label",
                        "housenum_label",
                    ]),
                },
            ],
        }
    }
}
