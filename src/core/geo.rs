use crate::core::projection::MAX_LATITUDE;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Geographic viewport bounds in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

impl GeoBounds {
    pub fn new(west: f64, east: f64, north: f64, south: f64) -> Self {
        Self {
            west,
            east,
            north,
            south,
        }
    }

    /// Midpoint of the bounds as `(lng, lat)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.north + self.south) / 2.0,
        )
    }

    /// Checks whether a WGS84 point falls inside the bounds.
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.west && lng <= self.east && lat >= self.south && lat <= self.north
    }

    /// Checks whether two bounds overlap.
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        !(other.east < self.west
            || other.west > self.east
            || other.north < self.south
            || other.south > self.north)
    }

    /// True when west ≤ east and south ≤ north.
    ///
    /// Bounds crossing the antimeridian are not valid here; tile
    /// enumeration over them is undefined.
    pub fn is_valid(&self) -> bool {
        self.west <= self.east && self.south <= self.north
    }
}

/// Region a descendant tile occupies within an ancestor's unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChildRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A slippy-map tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Canonical `"z/x/y"` key; the tile's identity across cache, queue and
    /// in-flight tracking.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Parses a canonical `"z/x/y"` key; `None` for malformed input or
    /// coordinates outside the zoom level's grid.
    pub fn parse_key(key: &str) -> Option<TileCoord> {
        let mut parts = key.split('/');
        let z = parts.next()?.parse::<u8>().ok()?;
        let x = parts.next()?.parse::<u32>().ok()?;
        let y = parts.next()?.parse::<u32>().ok()?;
        if parts.next().is_some() {
            return None;
        }

        let coord = TileCoord::new(x, y, z);
        coord.is_valid().then_some(coord)
    }

    /// Creates the tile containing a WGS84 point, clamped into the grid.
    pub fn from_lng_lat(lng: f64, lat: f64, zoom: u8) -> Self {
        let n = 2_f64.powi(zoom as i32);
        let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

        let x = ((lng + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

        let max = n - 1.0;
        Self::new(x.clamp(0.0, max) as u32, y.clamp(0.0, max) as u32, zoom)
    }

    /// WGS84 coordinates of the tile's northwest corner as `(lng, lat)`.
    pub fn to_lng_lat(&self) -> (f64, f64) {
        let n = 2_f64.powi(self.z as i32);
        let lng = self.x as f64 / n * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * self.y as f64 / n))
            .sinh()
            .atan()
            .to_degrees();
        (lng, lat)
    }

    /// Geographic bounds covered by the tile.
    pub fn bounds(&self) -> GeoBounds {
        let (west, north) = self.to_lng_lat();
        let (east, south) = TileCoord::new(self.x + 1, self.y + 1, self.z).to_lng_lat();
        GeoBounds::new(west, east, north, south)
    }

    /// The enclosing tile one zoom level up, or `None` at the root.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            None
        } else {
            Some(TileCoord::new(self.x >> 1, self.y >> 1, self.z - 1))
        }
    }

    /// The ancestor chain from the immediate parent down to `min_zoom`
    /// (default zoom 0), nearest first.
    pub fn parents(&self, min_zoom: Option<u8>) -> Vec<TileCoord> {
        let floor = min_zoom.unwrap_or(0);
        let mut chain = Vec::new();
        let mut current = *self;
        while let Some(parent) = current.parent() {
            if parent.z < floor {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// The four covering tiles one zoom level down. Empty near the grid
    /// limit where child indices would overflow.
    pub fn children(&self) -> Vec<TileCoord> {
        if self.z >= 30 {
            return Vec::new();
        }
        vec![
            TileCoord::new(self.x * 2, self.y * 2, self.z + 1),
            TileCoord::new(self.x * 2 + 1, self.y * 2, self.z + 1),
            TileCoord::new(self.x * 2, self.y * 2 + 1, self.z + 1),
            TileCoord::new(self.x * 2 + 1, self.y * 2 + 1, self.z + 1),
        ]
    }

    /// Where this tile sits inside `parent`'s unit square, or `None` when
    /// `parent` is not a strict ancestor.
    pub fn region_in(&self, parent: &TileCoord) -> Option<ChildRegion> {
        if parent.z >= self.z {
            return None;
        }
        let levels = self.z - parent.z;
        if self.x >> levels != parent.x || self.y >> levels != parent.y {
            return None;
        }

        let scale = 2_f64.powi(levels as i32);
        let size = 1.0 / scale;
        Some(ChildRegion {
            x: (self.x - (parent.x << levels)) as f64 / scale,
            y: (self.y - (parent.y << levels)) as f64 / scale,
            width: size,
            height: size,
        })
    }

    /// Checks that the coordinate sits inside its zoom level's grid.
    pub fn is_valid(&self) -> bool {
        if self.z >= 31 {
            return false;
        }
        let max_coord = 1_u32 << self.z;
        self.x < max_coord && self.y < max_coord
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl std::str::FromStr for TileCoord {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TileCoord::parse_key(s).ok_or_else(|| crate::Error::MalformedTileKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_round_trip() {
        let coord = TileCoord::new(3, 4, 5);
        assert_eq!(coord.key(), "5/3/4");
        assert_eq!(TileCoord::parse_key("5/3/4"), Some(coord));
    }

    #[test]
    fn test_parse_key_malformed() {
        assert_eq!(TileCoord::parse_key(""), None);
        assert_eq!(TileCoord::parse_key("5/3"), None);
        assert_eq!(TileCoord::parse_key("5/3/4/1"), None);
        assert_eq!(TileCoord::parse_key("a/b/c"), None);
        assert_eq!(TileCoord::parse_key("5/-1/4"), None);
        // out of the zoom-5 grid
        assert_eq!(TileCoord::parse_key("5/32/0"), None);
    }

    #[test]
    fn test_from_str_surfaces_malformed_keys() {
        assert_eq!("5/3/4".parse::<TileCoord>().unwrap(), TileCoord::new(3, 4, 5));
        assert!(matches!(
            "5;3;4".parse::<TileCoord>(),
            Err(crate::Error::MalformedTileKey(_))
        ));
    }

    #[test]
    fn test_from_lng_lat_new_york() {
        let tile = TileCoord::from_lng_lat(-74.0060, 40.7128, 10);
        assert_eq!(tile, TileCoord::new(301, 385, 10));
    }

    #[test]
    fn test_from_lng_lat_clamps_to_grid() {
        let tile = TileCoord::from_lng_lat(180.0, -90.0, 2);
        assert!(tile.is_valid());
        assert_eq!(tile.z, 2);
    }

    #[test]
    fn test_parent_chain() {
        let coord = TileCoord::new(5, 6, 3);
        assert_eq!(coord.parent(), Some(TileCoord::new(2, 3, 2)));

        let chain = coord.parents(None);
        assert_eq!(
            chain,
            vec![
                TileCoord::new(2, 3, 2),
                TileCoord::new(1, 1, 1),
                TileCoord::new(0, 0, 0),
            ]
        );

        assert_eq!(coord.parents(Some(2)), vec![TileCoord::new(2, 3, 2)]);
        assert_eq!(TileCoord::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_children_cover_parent() {
        let parent = TileCoord::new(1, 2, 2);
        let children = parent.children();
        assert_eq!(children.len(), 4);
        for child in children {
            assert_eq!(child.parent(), Some(parent));
        }
    }

    #[test]
    fn test_region_in_immediate_parent() {
        let parent = TileCoord::new(1, 1, 1);
        let child = TileCoord::new(3, 2, 2);
        let region = child.region_in(&parent).unwrap();
        assert_eq!(region.x, 0.5);
        assert_eq!(region.y, 0.0);
        assert_eq!(region.width, 0.5);
        assert_eq!(region.height, 0.5);
    }

    #[test]
    fn test_region_in_grandparent() {
        let parent = TileCoord::new(0, 0, 0);
        let child = TileCoord::new(3, 1, 2);
        let region = child.region_in(&parent).unwrap();
        assert_eq!(region.x, 0.75);
        assert_eq!(region.y, 0.25);
        assert_eq!(region.width, 0.25);
    }

    #[test]
    fn test_region_in_rejects_non_ancestor() {
        let child = TileCoord::new(3, 2, 2);
        assert!(child.region_in(&TileCoord::new(0, 1, 1)).is_none());
        // same zoom is not an ancestor
        assert!(child.region_in(&TileCoord::new(3, 2, 2)).is_none());
        // deeper than the child
        assert!(child.region_in(&TileCoord::new(6, 4, 3)).is_none());
    }

    #[test]
    fn test_bounds_center_and_contains() {
        let bounds = GeoBounds::new(-10.0, 10.0, 20.0, -20.0);
        assert_eq!(bounds.center(), (0.0, 0.0));
        assert!(bounds.contains(5.0, -15.0));
        assert!(!bounds.contains(15.0, 0.0));
        assert!(bounds.is_valid());
        assert!(!GeoBounds::new(170.0, -170.0, 10.0, -10.0).is_valid());
    }

    #[test]
    fn test_tile_bounds_contain_interior_point() {
        let tile = TileCoord::from_lng_lat(-74.0060, 40.7128, 8);
        let bounds = tile.bounds();
        assert!(bounds.contains(-74.0060, 40.7128));
        assert!(bounds.north > bounds.south);
        assert!(bounds.east > bounds.west);
    }

    proptest! {
        #[test]
        fn prop_key_round_trip(z in 0u8..=22, frac_x in 0.0..1.0_f64, frac_y in 0.0..1.0_f64) {
            let n = 1u32 << z;
            let coord = TileCoord::new(
                ((frac_x * n as f64) as u32).min(n - 1),
                ((frac_y * n as f64) as u32).min(n - 1),
                z,
            );
            prop_assert_eq!(TileCoord::parse_key(&coord.key()), Some(coord));
        }
    }
}
