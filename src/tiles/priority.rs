//! Visible-tile enumeration and center-out load ordering.
//!
//! The loader asks two questions per view change: which tiles cover the
//! viewport at the target zoom, and in what order should they be fetched so
//! the middle of the screen fills in first.

use crate::core::geo::{GeoBounds, TileCoord};
use std::collections::{HashSet, VecDeque};
use std::f64::consts::PI;

/// Raw slippy-map tile indices for a WGS84 point.
///
/// No clamping is applied; callers bound-check the result against the
/// `2^zoom` grid (or use [`TileCoord::from_lng_lat`] for a clamped tile).
pub fn lng_lat_to_tile(lng: f64, lat: f64, zoom: u8) -> (i64, i64) {
    let n = 2_f64.powi(zoom as i32);
    let lat_rad = lat.to_radians();

    let x = ((lng + 180.0) / 360.0 * n).floor() as i64;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as i64;
    (x, y)
}

/// Enumerates every tile in the axis-aligned rectangle covering `bounds`
/// at `zoom`, column by column.
///
/// Bounds crossing the antimeridian (`west > east`) are not handled and
/// yield nothing.
pub fn visible_tiles(bounds: &GeoBounds, zoom: u8) -> Vec<TileCoord> {
    if !bounds.is_valid() {
        return Vec::new();
    }

    let max = (1_i64 << zoom) - 1;
    let (min_x, min_y) = lng_lat_to_tile(bounds.west, bounds.north, zoom);
    let (max_x, max_y) = lng_lat_to_tile(bounds.east, bounds.south, zoom);

    let min_x = min_x.clamp(0, max);
    let max_x = max_x.clamp(0, max);
    let min_y = min_y.clamp(0, max);
    let max_y = max_y.clamp(0, max);

    let mut tiles = Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)) as usize);
    for x in min_x..=max_x {
        for y in min_y..=max_y {
            tiles.push(TileCoord::new(x as u32, y as u32, zoom));
        }
    }
    tiles
}

/// The tile under the viewport midpoint.
pub fn viewport_center_tile(bounds: &GeoBounds, zoom: u8) -> TileCoord {
    let (lng, lat) = bounds.center();
    TileCoord::from_lng_lat(lng, lat, zoom)
}

fn distance_sq(a: TileCoord, b: TileCoord) -> i64 {
    let dx = a.x as i64 - b.x as i64;
    let dy = a.y as i64 - b.y as i64;
    dx * dx + dy * dy
}

/// Orders tiles center-out by squared grid distance (stable sort).
///
/// Suited to the modest tile counts a single viewport produces; for very
/// large sets [`prioritize_tiles_bfs`] avoids the sort.
pub fn prioritize_tiles(mut tiles: Vec<TileCoord>, center: TileCoord) -> Vec<TileCoord> {
    tiles.sort_by_key(|tile| distance_sq(*tile, center));
    tiles
}

/// Orders tiles center-out by 4-connected breadth-first traversal from the
/// center tile, restricted to the given set.
///
/// Tiles not reachable from the center through the set are omitted; for
/// the rectangles [`visible_tiles`] produces this never drops anything.
pub fn prioritize_tiles_bfs(tiles: &[TileCoord], center: TileCoord) -> Vec<TileCoord> {
    let members: HashSet<TileCoord> = tiles.iter().copied().collect();
    if !members.contains(&center) {
        return Vec::new();
    }

    let mut visited = HashSet::with_capacity(members.len());
    let mut queue = VecDeque::new();
    let mut ordered = Vec::with_capacity(members.len());

    visited.insert(center);
    queue.push_back(center);

    while let Some(tile) = queue.pop_front() {
        ordered.push(tile);

        let mut visit = |x: i64, y: i64| {
            if x < 0 || y < 0 {
                return;
            }
            let neighbor = TileCoord::new(x as u32, y as u32, tile.z);
            if members.contains(&neighbor) && visited.insert(neighbor) {
                queue.push_back(neighbor);
            }
        };

        let (x, y) = (tile.x as i64, tile.y as i64);
        visit(x + 1, y);
        visit(x - 1, y);
        visit(x, y + 1);
        visit(x, y - 1);
    }

    ordered
}
