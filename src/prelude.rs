//! Prelude module for common rasterlet types and traits
//!
//! Re-exports the most commonly used types, traits, and functions for easy
//! importing with `use rasterlet::prelude::*;`

pub use crate::core::{
    engine::TileEngine,
    geo::{ChildRegion, GeoBounds, TileCoord},
    projection::{web_mercator_to_wgs84, wgs84_to_web_mercator, Converter, ProjectionDef},
};

pub use crate::tiles::{
    cache::{CacheStats, TileCache},
    loader::{
        Clock, DefaultSizeEstimator, LoadingStats, SizeEstimator, SystemClock, TileFetcher,
        TileLoadHandle, TileLoader, TileLoaderConfig, TileRecord, TileState,
    },
    priority::{prioritize_tiles, prioritize_tiles_bfs, viewport_center_tile, visible_tiles},
};

pub use crate::{Error, Result};
