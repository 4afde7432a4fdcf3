//! Provides utilities related to coordinates.

use std::{
    f64::consts::PI,
    fmt,
    fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

/// Mean earth radius used by web mercator, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;
/// Latitude limit of the web mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511;

/// Deepest zoom level tiles are requested at, whatever the configured tile range.
pub const MAX_ZOOM_LEVEL: u8 = 30;
/// Tile-local coordinate span most vector tiles are encoded with.
pub const EXTENT: u32 = 4096;

#[derive(
    Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Debug, Default, Serialize, Deserialize,
)]
pub struct ZoomLevel(u8);

impl ZoomLevel {
    pub const fn new(z: u8) -> Self {
        ZoomLevel(z)
    }

    /// Number of tiles along one axis at this zoom level, saturating beyond the `u32` range.
    pub fn grid_size(self) -> u32 {
        1u32.checked_shl(u32::from(self.0)).unwrap_or(u32::MAX)
    }

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl Display for ZoomLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ZoomLevel {
    fn from(zoom_level: u8) -> Self {
        ZoomLevel(zoom_level)
    }
}

impl From<ZoomLevel> for u8 {
    fn from(val: ZoomLevel) -> Self {
        val.0
    }
}

impl From<ZoomLevel> for f64 {
    fn from(val: ZoomLevel) -> Self {
        f64::from(val.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLon {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        LatLon {
            latitude,
            longitude,
        }
    }

    /// Wraps the longitude into `[-180, 180]` and clamps the latitude to the range web
    /// mercator can represent. Non-finite coordinates become `0`.
    #[must_use]
    pub fn normalize(self) -> Self {
        let longitude = match self.longitude {
            longitude if !longitude.is_finite() => 0.0,
            longitude if (-180.0..=180.0).contains(&longitude) => longitude,
            longitude => (longitude + 180.0).rem_euclid(360.0) - 180.0,
        };
        let latitude = if self.latitude.is_nan() {
            0.0
        } else {
            self.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE)
        };

        LatLon {
            latitude,
            longitude,
        }
    }

    /// Projects into fractional tile space at `zoom`.
    pub fn to_tile_position(self, zoom: f64) -> TilePosition {
        let scale = 2f64.powf(zoom);
        let lat = self.latitude * PI / 180.0;

        TilePosition {
            x: (self.longitude + 180.0) / 360.0 * scale,
            y: (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale,
            zoom,
        }
    }
}

impl Display for LatLon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A position in fractional tile space: the integer part addresses a tile, the fraction
/// the offset within it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TilePosition {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl TilePosition {
    pub fn to_lat_lon(self) -> LatLon {
        let scale = 2f64.powf(self.zoom);
        let n = PI - 2.0 * PI * self.y / scale;

        LatLon {
            latitude: 180.0 / PI * (0.5 * (n.exp() - (-n).exp())).atan(),
            longitude: self.x / scale * 360.0 - 180.0,
        }
    }
}

/// Address of a single tile in the XYZ tiling scheme.
#[derive(Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Debug, Default)]
pub struct TileCoords {
    pub x: u32,
    pub y: u32,
    pub z: ZoomLevel,
}

impl From<(u32, u32, ZoomLevel)> for TileCoords {
    fn from(tuple: (u32, u32, ZoomLevel)) -> Self {
        TileCoords {
            x: tuple.0,
            y: tuple.1,
            z: tuple.2,
        }
    }
}

impl Display for TileCoords {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "T({x}, {y}, {z})", x = self.x, y = self.y, z = self.z)
    }
}

/// The zoom level tiles are requested at for a fractional `zoom`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn base_zoom(zoom: f64, tile_range: u8) -> ZoomLevel {
    let max = tile_range.min(MAX_ZOOM_LEVEL);
    // Clamped into u8 range before the cast.
    ZoomLevel::new(zoom.floor().clamp(0.0, f64::from(max)) as u8)
}

/// On-screen size in pixels of one tile when rendering at the fractional `zoom`.
pub fn tile_size_at_zoom(zoom: f64, tile_range: u8, project_size: f64) -> f64 {
    project_size * 2f64.powf(zoom - f64::from(base_zoom(zoom, tile_range)))
}

pub fn meters_per_pixel(zoom: f64, latitude: f64) -> f64 {
    ((latitude * PI / 180.0).cos() * 2.0 * PI * EARTH_RADIUS) / (256.0 * 2f64.powf(zoom))
}
