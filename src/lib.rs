//! # Rasterlet
//!
//! Tile loading and caching core for GPU-accelerated visualization of
//! Cloud-Optimized GeoTIFF rasters.
//!
//! Rasterlet keeps a large remote raster renderable against a moving
//! viewport: it decides which tiles are visible, fetches them through a
//! host-supplied callback with bounded parallelism, and keeps decoded
//! payloads in a byte-budgeted LRU cache that survives panning and is
//! invalidated coherently on zoom.
//!
//! ## What it does
//!
//! - **Byte-budgeted LRU cache** of decoded tile payloads, tagged by load
//!   generation for cheap whole-zoom invalidation
//! - **Viewport-driven loading**: debounced view changes, center-out
//!   prioritization, an in-flight cap and per-frame start pacing
//! - **Stale-result discard**: loads finishing after a zoom change never
//!   touch records or cache
//! - **Parent fallback**: render a lower-resolution ancestor while the
//!   exact tile streams in
//! - **Web Mercator ↔ WGS84** closed-form conversions
//!
//! The GPU rasterizer, the COG byte-range reader and the host UI live
//! outside this crate; rasterlet talks to them through the
//! [`TileFetcher`] seam and the renderer-facing read API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rasterlet::{GeoBounds, TileEngine};
//!
//! let mut engine = TileEngine::new(Box::new(my_cog_fetcher));
//!
//! // on every pan/zoom event:
//! engine.viewport_changed(GeoBounds::new(-74.3, -73.7, 41.0, 40.5), 12);
//!
//! // once per render frame:
//! engine.frame();
//!
//! // when drawing a tile:
//! if let Some(record) = engine.get_tile("12/1205/1539") {
//!     // upload record.payload, modulate by engine.tile_fade_alpha(record)
//! }
//! ```

pub mod core;
pub mod prelude;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    engine::TileEngine,
    geo::{ChildRegion, GeoBounds, TileCoord},
    projection::{
        web_mercator_to_wgs84, wgs84_to_web_mercator, Converter, ProjectionDef, EARTH_RADIUS,
        MAX_LATITUDE,
    },
};

pub use tiles::{
    cache::{CacheStats, TileCache},
    loader::{
        rgba_texture_size_bytes, texture_size_bytes, Clock, DefaultSizeEstimator, LoadingStats,
        SizeEstimator, SystemClock, TileFetcher, TileLoadHandle, TileLoader, TileLoaderConfig,
        TileRecord, TileState,
    },
    priority::{
        lng_lat_to_tile, prioritize_tiles, prioritize_tiles_bfs, viewport_center_tile,
        visible_tiles,
    },
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Converter requested for an EPSG pair the crate does not support.
    #[error("unsupported projection: {0}")]
    UnsupportedProjection(String),

    /// A tile key that is not of the canonical `"z/x/y"` form.
    #[error("malformed tile key: {0}")]
    MalformedTileKey(String),

    /// Whatever the host's tile fetch surfaced.
    #[error("tile load failed: {0}")]
    LoadFailed(String),
}
