//! The capability the renderer fetches raw tiles through.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::coords::TileCoords;

#[derive(Error, Debug)]
#[error("failed to fetch from source")]
pub struct SourceFetchError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// Delivers raw, optionally gzipped, protobuf vector tiles.
///
/// Implementations decide where tiles come from (network, disk, an mbtiles archive).
/// Failures are reported per tile and never abort a frame.
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch(&self, coords: &TileCoords) -> Result<Vec<u8>, SourceFetchError>;
}

#[derive(Error, Debug)]
#[error("tile {0} is not available")]
pub struct TileUnavailable(pub TileCoords);

/// A source serving tiles from memory.
#[derive(Default, Clone)]
pub struct StaticTileSource {
    tiles: HashMap<TileCoords, Vec<u8>>,
}

impl StaticTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coords: TileCoords, data: Vec<u8>) {
        self.tiles.insert(coords, data);
    }

    pub fn with_tile(mut self, coords: TileCoords, data: Vec<u8>) -> Self {
        self.insert(coords, data);
        self
    }
}

#[async_trait]
impl TileSource for StaticTileSource {
    async fn fetch(&self, coords: &TileCoords) -> Result<Vec<u8>, SourceFetchError> {
        self.tiles
            .get(coords)
            .cloned()
            .ok_or_else(|| SourceFetchError(Box::new(TileUnavailable(*coords))))
    }
}

#[cfg(test)]
mod tests {
    use super::{StaticTileSource, TileSource};
    use crate::coords::{TileCoords, ZoomLevel};

    #[tokio::test]
    async fn test_static_source() {
        let coords = TileCoords::from((1, 0, ZoomLevel::new(1)));
        let source = StaticTileSource::new().with_tile(coords, vec![1, 2, 3]);

        assert_eq!(source.fetch(&coords).await.unwrap(), vec![1, 2, 3]);

        let missing = TileCoords::from((0, 0, ZoomLevel::new(1)));
        let error = source.fetch(&missing).await.unwrap_err();
        let cause = std::error::Error::source(&error).unwrap();
        assert_eq!(cause.to_string(), "tile T(0, 0, 1) is not available");
    }
}
