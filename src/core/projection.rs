//! Web Mercator (EPSG:3857) ↔ WGS84 (EPSG:4326) conversions.
//!
//! COG sources handled by this crate are always Web Mercator, so the two
//! closed-form transforms below replace a full reprojection library and the
//! network round-trip it would need to resolve authority codes.

use crate::{Error, Result};
use std::f64::consts::PI;

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which the square Web Mercator world plane ends.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Half the Web Mercator world extent in meters.
const HALF_WORLD: f64 = PI * EARTH_RADIUS;

/// Converts Web Mercator meters to WGS84 degrees.
pub fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lng = x / HALF_WORLD * 180.0;
    let lat = (y / HALF_WORLD * PI).exp().atan().to_degrees() * 2.0 - 90.0;
    (lng, lat)
}

/// Converts WGS84 degrees to Web Mercator meters.
pub fn wgs84_to_web_mercator(lng: f64, lat: f64) -> (f64, f64) {
    let x = lng * HALF_WORLD / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / PI * HALF_WORLD;
    (x, y)
}

/// Normalized projection record in the shape proj-style consumers expect.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionDef {
    pub name: &'static str,
    pub units: &'static str,
    /// Semi-major axis in meters.
    pub a: f64,
    /// Semi-minor axis in meters (spherical: equal to `a`).
    pub b: f64,
    pub lat0: f64,
    pub long0: f64,
    pub scale: f64,
}

impl ProjectionDef {
    /// The single definition this crate guarantees: spherical Web Mercator.
    pub fn web_mercator() -> Self {
        Self {
            name: "merc",
            units: "meter",
            a: EARTH_RADIUS,
            b: EARTH_RADIUS,
            lat0: 0.0,
            long0: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transform {
    Identity,
    MercatorToGeographic,
    GeographicToMercator,
}

/// Forward/inverse coordinate converter between a pair of EPSG codes.
///
/// Only `3857 ↔ 4326` and the identity pair are supported; any other pair
/// fails with [`Error::UnsupportedProjection`].
#[derive(Debug, Clone)]
pub struct Converter {
    source: u32,
    target: u32,
    transform: Transform,
}

impl Converter {
    /// Builds a converter for the ordered pair `(source, target)`.
    ///
    /// Codes may carry an `"EPSG:"` prefix or not; the first decimal digit
    /// run is what counts.
    pub fn new(source: &str, target: &str) -> Result<Self> {
        let src = parse_epsg_code(source)
            .ok_or_else(|| Error::UnsupportedProjection(source.to_string()))?;
        let tgt = parse_epsg_code(target)
            .ok_or_else(|| Error::UnsupportedProjection(target.to_string()))?;

        let transform = match (src, tgt) {
            (s, t) if s == t => Transform::Identity,
            (3857, 4326) => Transform::MercatorToGeographic,
            (4326, 3857) => Transform::GeographicToMercator,
            (s, t) => {
                return Err(Error::UnsupportedProjection(format!(
                    "EPSG:{s} -> EPSG:{t}"
                )))
            }
        };

        Ok(Self {
            source: src,
            target: tgt,
            transform,
        })
    }

    pub fn source(&self) -> u32 {
        self.source
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Applies the source → target transform.
    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        match self.transform {
            Transform::Identity => (x, y),
            Transform::MercatorToGeographic => web_mercator_to_wgs84(x, y),
            Transform::GeographicToMercator => wgs84_to_web_mercator(x, y),
        }
    }

    /// Applies the target → source transform.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self.transform {
            Transform::Identity => (x, y),
            Transform::MercatorToGeographic => wgs84_to_web_mercator(x, y),
            Transform::GeographicToMercator => web_mercator_to_wgs84(x, y),
        }
    }
}

/// Extracts the first decimal digit run from an EPSG code string.
fn parse_epsg_code(code: &str) -> Option<u32> {
    let start = code.find(|c: char| c.is_ascii_digit())?;
    let run = &code[start..];
    let end = run
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(run.len());
    run[..end].parse().ok()
}
