//! Decoded tiles keyed by their coordinates.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};

use crate::{
    config::Config,
    coords::TileCoords,
    error::Error,
    io::source_client::TileSource,
    style::Styler,
    tile::Tile,
};

#[derive(Default)]
struct TileStore {
    tiles: BTreeMap<TileCoords, Arc<Tile>>,
    /// Insertion order, oldest first.
    order: VecDeque<TileCoords>,
}

/// Fetches tiles from a [`TileSource`], decodes them and keeps the most recently decoded
/// ones. Decoded tiles are shared with the renderer, never copied.
pub struct TileRepository<S> {
    source: S,
    styler: Arc<Styler>,
    config: Arc<Config>,
    store: Mutex<TileStore>,
}

impl<S: TileSource> TileRepository<S> {
    pub fn new(source: S, styler: Arc<Styler>, config: Arc<Config>) -> Self {
        Self {
            source,
            styler,
            config,
            store: Mutex::new(TileStore::default()),
        }
    }

    /// Returns the cached tile or fetches and decodes it.
    pub async fn get_tile(&self, coords: TileCoords) -> Result<Arc<Tile>, Error> {
        if let Some(tile) = self.cached(&coords) {
            return Ok(tile);
        }

        let data = self.source.fetch(&coords).await?;
        let tile = Arc::new(Tile::load(coords, &data, &self.styler, &self.config)?);
        self.put(coords, tile.clone());
        Ok(tile)
    }

    pub fn cached(&self, coords: &TileCoords) -> Option<Arc<Tile>> {
        let store = self.store.lock().ok()?;
        store.tiles.get(coords).cloned()
    }

    pub fn len(&self) -> usize {
        self.store.lock().map_or(0, |store| store.tiles.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put(&self, coords: TileCoords, tile: Arc<Tile>) {
        let Ok(mut store) = self.store.lock() else {
            return;
        };
        if store.tiles.insert(coords, tile).is_none() {
            store.order.push_back(coords);
        }
        while store.tiles.len() > self.config.tile_cache_size {
            let Some(oldest) = store.order.pop_front() else {
                break;
            };
            store.tiles.remove(&oldest);
            log::trace!("evicted tile {oldest}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;

    use super::TileRepository;
    use crate::{
        config::Config,
        coords::{TileCoords, ZoomLevel},
        error::Error,
        io::source_client::{SourceFetchError, StaticTileSource, TileSource},
        tile::tests::{sample_styler, sample_tile},
    };

    struct CountingSource {
        inner: StaticTileSource,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl TileSource for CountingSource {
        async fn fetch(&self, coords: &TileCoords) -> Result<Vec<u8>, SourceFetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(coords).await
        }
    }

    fn coords(x: u32) -> TileCoords {
        TileCoords::from((x, 0, ZoomLevel::new(3)))
    }

    fn repository(cache_size: usize) -> TileRepository<CountingSource> {
        let mut inner = StaticTileSource::new();
        for x in 0..4 {
            inner.insert(coords(x), sample_tile());
        }
        inner.insert(coords(7), vec![0x1f, 0x8b, 0x00]);
        let config = Config {
            tile_cache_size: cache_size,
            ..Config::default()
        };
        TileRepository::new(
            CountingSource {
                inner,
                fetches: AtomicUsize::new(0),
            },
            Arc::new(sample_styler()),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn test_tiles_are_shared() {
        let repository = repository(16);
        let first = repository.get_tile(coords(0)).await.unwrap();
        let second = repository.get_tile(coords(0)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repository.source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.coords(), coords(0));
    }

    #[tokio::test]
    async fn test_oldest_tile_is_evicted() {
        let repository = repository(2);
        for x in 0..3 {
            repository.get_tile(coords(x)).await.unwrap();
        }

        assert_eq!(repository.len(), 2);
        assert!(repository.cached(&coords(0)).is_none());
        assert!(repository.cached(&coords(1)).is_some());
        assert!(repository.cached(&coords(2)).is_some());
    }

    #[tokio::test]
    async fn test_failures() {
        let repository = repository(16);
        assert!(matches!(
            repository.get_tile(coords(5)).await,
            Err(Error::Source(_))
        ));
        assert!(matches!(
            repository.get_tile(coords(7)).await,
            Err(Error::Tile(_))
        ));
        assert!(repository.is_empty());
    }
}
