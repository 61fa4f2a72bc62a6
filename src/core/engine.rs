//! Orchestration glue between host events and the tile loader.

use crate::core::geo::{GeoBounds, TileCoord};
use crate::tiles::cache::CacheStats;
use crate::tiles::loader::{
    LoadingStats, TileFetcher, TileLoader, TileLoaderConfig, TileRecord,
};

/// Binds a viewport callback and a frame tick to a [`TileLoader`].
///
/// The host wires two things: pan/zoom events into [`viewport_changed`]
/// and the render loop into [`frame`]. Everything else is read access for
/// the rasterizer.
///
/// [`viewport_changed`]: TileEngine::viewport_changed
/// [`frame`]: TileEngine::frame
pub struct TileEngine<T> {
    loader: TileLoader<T>,
}

impl<T> TileEngine<T> {
    pub fn new(fetcher: Box<dyn TileFetcher<T>>) -> Self {
        Self {
            loader: TileLoader::new(fetcher),
        }
    }

    pub fn with_config(fetcher: Box<dyn TileFetcher<T>>, config: TileLoaderConfig) -> Self {
        Self {
            loader: TileLoader::with_config(fetcher, config),
        }
    }

    /// Wraps an already-built loader (custom clock or size estimator).
    pub fn from_loader(loader: TileLoader<T>) -> Self {
        Self { loader }
    }

    /// Viewport callback; route pan and zoom events here.
    pub fn viewport_changed(&mut self, bounds: GeoBounds, zoom: u8) {
        self.loader.update_viewport(bounds, zoom);
    }

    /// Frame tick; call once per rendered frame.
    pub fn frame(&mut self) {
        self.loader.process_queue();
    }

    pub fn get_tile(&mut self, key: &str) -> Option<&TileRecord<T>> {
        self.loader.get_tile(key)
    }

    pub fn loaded_tiles(&self) -> Vec<&TileRecord<T>> {
        self.loader.get_loaded_tiles()
    }

    pub fn find_loaded_parent(&self, coord: TileCoord) -> Option<&TileRecord<T>> {
        self.loader.find_loaded_parent(coord)
    }

    pub fn tile_fade_alpha(&self, record: &TileRecord<T>) -> f32 {
        self.loader.tile_fade_alpha(record)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.loader.get_cache_stats()
    }

    pub fn loading_stats(&self) -> LoadingStats {
        self.loader.get_loading_stats()
    }

    /// Resets the loader, cache and all tracked tiles.
    pub fn clear(&mut self) {
        self.loader.clear();
    }

    pub fn loader(&self) -> &TileLoader<T> {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut TileLoader<T> {
        &mut self.loader
    }
}
