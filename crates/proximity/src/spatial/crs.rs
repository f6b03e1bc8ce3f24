//! Coordinate reference systems and projection into planar metres.
//!
//! Distance thresholds are only meaningful in a planar, metre-based system,
//! so geographic coordinates are projected with a transverse Mercator
//! before any distance is measured. Only the forward (geographic to planar)
//! direction is implemented; planar inputs must already be in the target
//! system.

use std::fmt;
use std::str::FromStr;

use geo::Point;

use crate::error::ProjectionError;

// WGS84 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const INVERSE_FLATTENING: f64 = 298.257_223_563;

/// A coordinate reference system understood by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crs {
    /// Geographic latitude/longitude in degrees (EPSG:4326).
    Wgs84,
    /// SVY21 / Singapore TM, planar metres (EPSG:3414).
    Svy21,
    /// WGS84 / UTM, planar metres (EPSG:326xx north, 327xx south).
    Utm { zone: u8, north: bool },
}

impl Crs {
    /// Build a UTM system, validating the zone number.
    pub fn utm(zone: u8, north: bool) -> Result<Self, ProjectionError> {
        if !(1..=60).contains(&zone) {
            return Err(ProjectionError::InvalidUtmZone(zone));
        }
        Ok(Crs::Utm { zone, north })
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::Svy21 => 3414,
            Crs::Utm { zone, north: true } => 32600 + *zone as u32,
            Crs::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }

    /// Planar systems measure coordinates in metres.
    pub fn is_planar(&self) -> bool {
        !matches!(self, Crs::Wgs84)
    }

    fn transverse_mercator(&self) -> Option<TransverseMercator> {
        match *self {
            Crs::Wgs84 => None,
            Crs::Svy21 => Some(TransverseMercator {
                origin_lat: (1.0 + 22.0 / 60.0_f64).to_radians(),
                central_meridian: (103.0 + 50.0 / 60.0_f64).to_radians(),
                scale: 1.0,
                false_easting: 28_001.642,
                false_northing: 38_744.572,
            }),
            Crs::Utm { zone, north } => Some(TransverseMercator {
                origin_lat: 0.0,
                central_meridian: (zone as f64 * 6.0 - 183.0).to_radians(),
                scale: 0.9996,
                false_easting: 500_000.0,
                false_northing: if north { 0.0 } else { 10_000_000.0 },
            }),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    /// Accepts `EPSG:4326`, bare EPSG codes, and the names `wgs84` / `svy21`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let code = normalized.strip_prefix("epsg:").unwrap_or(&normalized);

        match code {
            "wgs84" | "4326" => return Ok(Crs::Wgs84),
            "svy21" | "3414" => return Ok(Crs::Svy21),
            _ => {}
        }

        let unknown = || ProjectionError::UnknownCrs(s.to_string());
        let epsg: u32 = code.parse().map_err(|_| unknown())?;
        match epsg {
            32601..=32660 => Crs::utm((epsg - 32600) as u8, true),
            32701..=32760 => Crs::utm((epsg - 32700) as u8, false),
            _ => Err(unknown()),
        }
    }
}

/// Transverse Mercator projection parameters on the WGS84 ellipsoid.
#[derive(Clone, Copy, Debug)]
struct TransverseMercator {
    origin_lat: f64,
    central_meridian: f64,
    scale: f64,
    false_easting: f64,
    false_northing: f64,
}

impl TransverseMercator {
    /// Project longitude/latitude in degrees to easting/northing in metres.
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let f = 1.0 / INVERSE_FLATTENING;
        let e2 = f * (2.0 - f);
        let ep2 = e2 / (1.0 - e2);

        let phi = lat.to_radians();
        let lambda = lon.to_radians();

        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = SEMI_MAJOR_AXIS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = (lambda - self.central_meridian) * cos_phi;

        let m = meridian_arc(phi, e2);
        let m0 = meridian_arc(self.origin_lat, e2);

        let a2 = a * a;
        let a3 = a2 * a;
        let a4 = a3 * a;
        let a5 = a4 * a;
        let a6 = a5 * a;

        let x = self.scale
            * n
            * (a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0);
        let y = self.scale
            * (m - m0
                + n * tan_phi
                    * (a2 / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

        (self.false_easting + x, self.false_northing + y)
    }
}

/// Distance along the meridian from the equator to latitude `phi`.
fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    SEMI_MAJOR_AXIS
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Projects one dataset's points into a planar target system.
#[derive(Clone, Copy, Debug)]
pub struct Projector {
    source: Crs,
    target: Crs,
    tm: Option<TransverseMercator>,
}

impl Projector {
    /// Validate that `source` can be brought into `target` for `dataset`.
    pub fn new(dataset: &str, source: Crs, target: Crs) -> Result<Self, ProjectionError> {
        let Some(target_tm) = target.transverse_mercator() else {
            return Err(ProjectionError::NonPlanarTarget(target));
        };

        let tm = if source == target {
            None
        } else if source == Crs::Wgs84 {
            Some(target_tm)
        } else {
            return Err(ProjectionError::Unsupported {
                dataset: dataset.to_string(),
                from: source,
                to: target,
            });
        };

        Ok(Self { source, target, tm })
    }

    pub fn source(&self) -> Crs {
        self.source
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Project a point, returning `None` for non-finite or out-of-range input.
    pub fn project(&self, point: Point) -> Option<Point> {
        let (x, y) = (point.x(), point.y());
        if !x.is_finite() || !y.is_finite() {
            return None;
        }

        let Some(tm) = self.tm else {
            return Some(point);
        };

        if !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&y) {
            return None;
        }

        let (easting, northing) = tm.forward(x, y);
        if easting.is_finite() && northing.is_finite() {
            Some(Point::new(easting, northing))
        } else {
            None
        }
    }
}
