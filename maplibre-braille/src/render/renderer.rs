//! Draws frames out of the tiles around a map center.
//!
//! A frame goes through explicit stages: the visible tiles are fetched concurrently, each
//! fetched tile's layer indexes are queried with the viewport, the queried features are
//! composed in draw order (labels last), and the canvas is encoded. Only one frame can be
//! drawn at a time per [`Renderer`]; concurrent requests fail with [`Error::Busy`].

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use cgmath::Point2;
use futures::future::join_all;
use instant::Instant;
use rstar::AABB;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    coords::{base_zoom, tile_size_at_zoom, LatLon, TileCoords},
    error::Error,
    io::{source_client::TileSource, tile_repository::TileRepository},
    render::{
        canvas::Canvas,
        label_buffer::{LabelBuffer, LabelPlacement},
        simplify::{simplify, TOLERANCE},
    },
    style::Styler,
    tile::{Feature, FeatureKind, Tile},
};

/// Clears the whole terminal.
pub const CLEAR: &str = "\x1B[2J";
/// Moves the cursor to the origin.
pub const MOVE: &str = "\x1B[?6h";

/// Label margin used when a clustered label falls back to the marker.
const CLUSTER_MARGIN: f64 = 3.0;

/// A tile overlapping the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleTile {
    pub coords: TileCoords,
    /// Screen position of the tile's top left corner.
    pub position: Point2<f64>,
    /// Size in pixels of the tile on screen.
    pub size: f64,
}

/// Tiles of the 3×3 block around `center` which overlap a `width`×`height` viewport.
///
/// Columns wrap around the antimeridian, rows outside the tile grid are skipped.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn visible_tiles(
    center: LatLon,
    zoom: f64,
    width: f64,
    height: f64,
    config: &Config,
) -> Vec<VisibleTile> {
    let z = base_zoom(zoom, config.tile_range);
    let center = center.normalize().to_tile_position(f64::from(z));
    let size = tile_size_at_zoom(zoom, config.tile_range, config.project_size);
    let grid_size = i64::from(z.grid_size());

    let center_x = center.x.floor() as i64;
    let center_y = center.y.floor() as i64;

    let mut tiles = Vec::with_capacity(9);
    for y in center_y - 1..=center_y + 1 {
        for x in center_x - 1..=center_x + 1 {
            let position = Point2::new(
                width / 2.0 - (center.x - x as f64) * size,
                height / 2.0 - (center.y - y as f64) * size,
            );

            if y < 0
                || y >= grid_size
                || position.x + size < 0.0
                || position.y + size < 0.0
                || position.x > width
                || position.y > height
            {
                continue;
            }

            tiles.push(VisibleTile {
                coords: TileCoords::from((x.rem_euclid(grid_size) as u32, y as u32, z)),
                position,
                size,
            });
        }
    }
    tiles
}

/// Features of one tile layer inside the viewport.
struct QueriedLayer {
    /// Tile-local units per screen pixel.
    scale: f64,
    features: Vec<Arc<Feature>>,
}

/// A fetched tile with its viewport queries.
struct TileView {
    tile: Arc<Tile>,
    position: Point2<f64>,
    zoom: f64,
    layers: HashMap<String, QueriedLayer>,
}

/// A label deferred to the final pass of a frame.
struct PendingLabel<'a> {
    view: &'a TileView,
    feature: Arc<Feature>,
    scale: f64,
}

/// Everything owned by the frame being drawn.
struct FrameState {
    canvas: Canvas,
    labels: LabelBuffer,
    /// Label texts placed in the current frame.
    seen: HashSet<String>,
    last_draw_at: Option<Instant>,
}

impl FrameState {
    #[allow(clippy::cast_precision_loss)]
    fn viewport(&self) -> (f64, f64) {
        (self.canvas.width() as f64, self.canvas.height() as f64)
    }
}

pub struct Renderer<S> {
    config: Arc<Config>,
    styler: Arc<Styler>,
    tiles: TileRepository<S>,
    frame: Mutex<FrameState>,
}

impl<S: TileSource> Renderer<S> {
    /// Creates a renderer drawing `width`×`height` pixel frames, rounded up to whole cells.
    pub fn new(source: S, styler: Styler, config: Config, width: usize, height: usize) -> Self {
        let config = Arc::new(config);
        let styler = Arc::new(styler);
        let frame = FrameState {
            canvas: Canvas::new(width, height, config.use_braille, &config.delimiter),
            labels: LabelBuffer::new(config.label_margin),
            seen: HashSet::new(),
            last_draw_at: None,
        };

        Self {
            tiles: TileRepository::new(source, styler.clone(), config.clone()),
            config,
            styler,
            frame: Mutex::new(frame),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn styler(&self) -> &Styler {
        &self.styler
    }

    pub fn tiles(&self) -> &TileRepository<S> {
        &self.tiles
    }

    /// Whether a frame is being drawn.
    pub fn is_drawing(&self) -> bool {
        self.frame.try_lock().is_err()
    }

    /// Resizes the canvas for the following frames.
    pub fn set_size(&self, width: usize, height: usize) -> Result<(), Error> {
        let mut state = self.frame.try_lock().map_err(|_| Error::Busy)?;
        state.canvas = Canvas::new(width, height, self.config.use_braille, &self.config.delimiter);
        Ok(())
    }

    /// Size of the canvas in pixels.
    pub fn size(&self) -> Result<(usize, usize), Error> {
        let state = self.frame.try_lock().map_err(|_| Error::Busy)?;
        Ok((state.canvas.width(), state.canvas.height()))
    }

    /// Features whose label was placed over pixel `(x, y)` in the last frame.
    pub fn features_at(&self, x: f64, y: f64) -> Result<Vec<Arc<Feature>>, Error> {
        let state = self.frame.try_lock().map_err(|_| Error::Busy)?;
        Ok(state
            .labels
            .features_at(x, y)
            .into_iter()
            .map(|placement: &LabelPlacement| placement.feature.clone())
            .collect())
    }

    /// Draws the map around `center` at the fractional `zoom` and returns the printable
    /// frame.
    ///
    /// Fails fast with [`Error::Busy`] if another frame is in flight. Tiles which cannot be
    /// fetched or decoded are left out of the frame.
    pub async fn draw(&self, center: LatLon, zoom: f64) -> Result<String, Error> {
        let Ok(mut state) = self.frame.try_lock() else {
            log::debug!("rejecting draw at {center} z{zoom}, another frame is in flight");
            return Err(Error::Busy);
        };
        let state = &mut *state;

        state.labels.clear();
        state.seen.clear();
        state.canvas.set_background(self.styler.background_color());
        state.canvas.clear();

        let (width, height) = state.viewport();
        let visible = visible_tiles(center, zoom, width, height, &self.config);
        let views = self.fetch_tiles(visible, zoom).await;
        let views: Vec<TileView> = views
            .into_iter()
            .map(|view| self.query_tile(view, width, height))
            .collect();

        self.compose(state, &views, zoom);

        let mut frame = String::new();
        if state.last_draw_at.is_none() {
            frame.push_str(CLEAR);
        }
        frame.push_str(MOVE);
        frame.push_str(&state.canvas.frame());
        state.last_draw_at = Some(Instant::now());

        log::debug!(
            "drew frame at {center} z{zoom} from {} tiles with {} labels",
            views.len(),
            state.labels.len()
        );
        Ok(frame)
    }

    async fn fetch_tiles(&self, visible: Vec<VisibleTile>, zoom: f64) -> Vec<TileView> {
        let fetches = visible.into_iter().map(|visible| async move {
            (visible, self.tiles.get_tile(visible.coords).await)
        });

        join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(visible, result)| match result {
                Ok(tile) => Some(TileView {
                    tile,
                    position: visible.position,
                    zoom,
                    layers: HashMap::new(),
                }),
                Err(e) => {
                    log::warn!("leaving out tile {}: {e}", visible.coords);
                    None
                }
            })
            .collect()
    }

    fn query_tile(&self, mut view: TileView, width: f64, height: f64) -> TileView {
        let size = tile_size_at_zoom(view.zoom, self.config.tile_range, self.config.project_size);
        for name in self.config.draw_order(view.zoom) {
            let Some(layer) = view.tile.layer(name) else {
                continue;
            };
            let scale = f64::from(layer.extent) / size;
            let envelope = AABB::from_corners(
                [-view.position.x * scale, -view.position.y * scale],
                [(width - view.position.x) * scale, (height - view.position.y) * scale],
            );
            let features = layer.query(&envelope).cloned().collect();
            view.layers.insert(name.clone(), QueriedLayer { scale, features });
        }
        view
    }

    fn compose(&self, state: &mut FrameState, views: &[TileView], zoom: f64) {
        let mut labels = Vec::new();

        for name in self.config.draw_order(zoom) {
            let is_label = name.contains("label");
            for view in views {
                let Some(layer) = view.layers.get(name) else {
                    continue;
                };
                for feature in &layer.features {
                    if is_label {
                        labels.push(PendingLabel {
                            view,
                            feature: feature.clone(),
                            scale: layer.scale,
                        });
                    } else {
                        self.draw_feature(state, view, feature, layer.scale);
                    }
                }
            }
        }

        labels.sort_by(|a, b| compare_sort_keys(a.feature.sort_key, b.feature.sort_key));
        for label in labels {
            self.draw_feature(state, label.view, &label.feature, label.scale);
        }
    }

    fn draw_feature(&self, state: &mut FrameState, view: &TileView, feature: &Arc<Feature>, scale: f64) {
        if !feature.style.is_visible_at(view.zoom) {
            return;
        }

        match feature.kind {
            FeatureKind::Line => {
                let Some(ring) = feature.rings.first() else {
                    return;
                };
                let projection = self.projection(state, view, scale);
                let points = scale_and_reduce(
                    ring,
                    &projection,
                    feature.kind,
                    true,
                    self.config.simplify_polylines,
                );
                if !points.is_empty() {
                    state
                        .canvas
                        .polyline(&points, feature.color, feature.style.line_width());
                }
            }
            FeatureKind::Fill => {
                let projection = self.projection(state, view, scale);
                let rings: Vec<_> = feature
                    .rings
                    .iter()
                    .map(|ring| {
                        scale_and_reduce(
                            ring,
                            &projection,
                            feature.kind,
                            false,
                            self.config.simplify_polylines,
                        )
                    })
                    .collect();
                state.canvas.polygon(&rings, feature.color);
            }
            FeatureKind::Symbol => self.draw_symbol(state, view, feature, scale),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw_symbol(&self, state: &mut FrameState, view: &TileView, feature: &Arc<Feature>, scale: f64) {
        let marker = self.config.poi_marker.as_str();
        let text = feature.label.as_deref().unwrap_or(marker);
        if feature.label.is_some() && state.seen.contains(text) {
            return;
        }

        let layer = self.config.layer(&feature.source_layer);
        let margin = layer
            .and_then(|layer| layer.margin)
            .unwrap_or(self.config.label_margin);
        let cluster = layer.is_some_and(|layer| layer.cluster);
        let length = text.chars().count() as f64;

        let Some(ring) = feature.rings.first() else {
            return;
        };
        let projection = self.projection(state, view, scale);
        let mut placed = false;
        for point in scale_and_reduce(ring, &projection, feature.kind, true, false) {
            let x = point.x - length;
            if state
                .labels
                .write_if_possible(text, x, point.y, feature.clone(), Some(margin))
            {
                state
                    .canvas
                    .text(text, x as i32, point.y as i32, feature.color, false);
                placed = true;
                break;
            }
            if cluster
                && state.labels.write_if_possible(
                    marker,
                    point.x,
                    point.y,
                    feature.clone(),
                    Some(CLUSTER_MARGIN),
                )
            {
                state
                    .canvas
                    .text(marker, point.x as i32, point.y as i32, feature.color, false);
                placed = true;
                break;
            }
        }

        if placed && feature.label.is_some() {
            state.seen.insert(text.to_string());
        }
    }

    fn projection(&self, state: &FrameState, view: &TileView, scale: f64) -> Projection {
        let (width, height) = state.viewport();
        Projection {
            position: view.position,
            scale,
            width,
            height,
            padding: self.config.tile_padding,
        }
    }
}

/// Maps the tile-local points of one tile layer onto the screen.
#[derive(Debug, Clone, Copy)]
struct Projection {
    /// Screen position of the tile's top left corner.
    position: Point2<f64>,
    /// Tile-local units per screen pixel.
    scale: f64,
    width: f64,
    height: f64,
    /// Pixels beyond the viewport still treated as on screen.
    padding: f64,
}

impl Projection {
    fn project(&self, point: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            (self.position.x + point.x / self.scale).floor(),
            (self.position.y + point.y / self.scale).floor(),
        )
    }

    fn is_outside(&self, point: &Point2<f64>) -> bool {
        point.x < -self.padding
            || point.x > self.width + self.padding
            || point.y < -self.padding
            || point.y > self.height + self.padding
    }
}

/// Projects tile-local points to screen pixels and drops consecutive duplicates.
///
/// With `filter`, a run of points outside the padded viewport is reduced to the points
/// where the geometry leaves and re-enters it, and lines with fewer than 2 points are
/// dropped. Fill rings (`filter` off) keep every projected point.
fn scale_and_reduce(
    points: &[Point2<f64>],
    projection: &Projection,
    kind: FeatureKind,
    filter: bool,
    simplify_polylines: bool,
) -> Vec<Point2<f64>> {
    let mut scaled = Vec::with_capacity(points.len());
    let mut last = None;
    let mut outside = false;
    let mut skipped = None;

    for point in points {
        let point = projection.project(point);
        if last == Some(point) {
            continue;
        }
        last = Some(point);

        if filter {
            if projection.is_outside(&point) {
                if outside {
                    skipped = Some(point);
                    continue;
                }
                outside = true;
            } else if outside {
                outside = false;
                if let Some(exit) = skipped.take() {
                    scaled.push(exit);
                }
            }
        }
        scaled.push(point);
    }

    if kind == FeatureKind::Symbol {
        return scaled;
    }
    if filter && scaled.len() < 2 {
        return Vec::new();
    }
    if simplify_polylines {
        simplify(&scaled, TOLERANCE)
    } else {
        scaled
    }
}

/// Ascending sort keys, features without a key last.
fn compare_sort_keys(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
