//! Geofence Zone Evaluation
//!
//! Circular safety zones with severity levels, evaluated against subject
//! positions using great-circle (haversine) distance.
//!
//! # Model
//!
//! ```text
//! contained(p, z)  <=>  haversine(p, z.center) <= z.radius_m
//! classify(p, Z)   =    kind of first z in Z (list order) with contained(p, z),
//!                       else Green
//! ```
//!
//! | Kind       | Severity | Subject status |
//! |------------|----------|----------------|
//! | green      | 0        | Safe           |
//! | yellow     | 1        | Warning        |
//! | restricted | 2        | Warning        |
//! | red        | 3        | Emergency      |
//!
//! # Known limitation
//!
//! Distances use a spherical Earth of mean radius 6,371 km. Against the
//! WGS-84 ellipsoid this deviates by up to ~0.5%, so a point within half a
//! percent of a zone boundary may be classified differently than a
//! geodesic-exact computation would.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

pub mod evaluator;
pub mod export;
pub mod fleet;
pub mod loader;
pub mod transition;
pub mod zone;

pub use evaluator::{classify, Classification, ContainmentPolicy, ZoneEvaluator};
pub use fleet::{Alert, AlertBoard, FleetAssessor, FleetSnapshot, FleetTracker, SubjectStatus};
pub use transition::{Transition, TransitionDetector};
pub use zone::{Zone, ZoneKind, ZoneSet};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Error, Debug)]
pub enum GeofenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing {0}")]
    MissingCoordinate(&'static str),
    #[error("Invalid {field}: {value}")]
    InvalidCoordinate { field: &'static str, value: f64 },
    #[error("Invalid radius for zone {zone}: {radius} (must be a positive number of meters)")]
    InvalidRadius { zone: String, radius: f64 },
    #[error("Invalid zone #{index}: {source}")]
    InvalidZone {
        index: usize,
        #[source]
        source: Box<GeofenceError>,
    },
    #[error("Invalid zone type: {0}")]
    UnknownZoneKind(String),
    #[error("Unknown containment policy: {0} (expected first-match or most-severe)")]
    UnknownPolicy(String),
}

pub type Result<T> = std::result::Result<T, GeofenceError>;

/// WGS-84 position in decimal degrees.
///
/// Only constructible through validation, so a `Point` always has finite,
/// in-range coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct Point {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl TryFrom<RawPoint> for Point {
    type Error = GeofenceError;

    fn try_from(raw: RawPoint) -> Result<Self> {
        Point::from_optional(raw.latitude, raw.longitude)
    }
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !is_valid_latitude(latitude) {
            return Err(GeofenceError::InvalidCoordinate {
                field: "latitude",
                value: latitude,
            });
        }
        if !is_valid_longitude(longitude) {
            return Err(GeofenceError::InvalidCoordinate {
                field: "longitude",
                value: longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build from possibly-absent coordinates. A missing value is an error,
    /// never a silent (0, 0).
    pub fn from_optional(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self> {
        let lat = latitude.ok_or(GeofenceError::MissingCoordinate("latitude"))?;
        let lon = longitude.ok_or(GeofenceError::MissingCoordinate("longitude"))?;
        Self::new(lat, lon)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

pub(crate) fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

pub(crate) fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Haversine distance between two points in meters
pub fn haversine_m(a: &Point, b: &Point) -> f64 {
    let lat1_rad = a.latitude * PI / 180.0;
    let lat2_rad = b.latitude * PI / 180.0;
    let dlat = (b.latitude - a.latitude) * PI / 180.0;
    let dlon = (b.longitude - a.longitude) * PI / 180.0;

    // Rounding can push h just past 1 for antipodal pairs
    let h = ((dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Point reached by travelling `distance_m` from `origin` along the great
/// circle with initial bearing `bearing_deg` (clockwise from north).
pub fn destination(origin: &Point, bearing_deg: f64, distance_m: f64) -> Point {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.latitude.to_radians();
    let lambda1 = origin.longitude.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon = (lambda2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    Point {
        latitude: phi2.to_degrees().clamp(-90.0, 90.0),
        longitude: lon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine() {
        // NYC to London: ~5,570 km
        let nyc = Point::new(40.7128, -74.006).unwrap();
        let london = Point::new(51.5074, -0.1278).unwrap();
        let dist = haversine_m(&nyc, &london);
        assert!((dist - 5_570_000.0).abs() < 50_000.0);

        // Same point: 0 m
        assert!(haversine_m(&nyc, &nyc).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = Point::new(28.74996, 77.117455).unwrap();
        let b = Point::new(28.7041, 77.1025).unwrap();
        assert!((haversine_m(&a, &b) - haversine_m(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_destination_distance() {
        let origin = Point::new(28.74996, 77.117455).unwrap();
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let p = destination(&origin, bearing, 50.0);
            assert!((haversine_m(&origin, &p) - 50.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_destination_wraps_antimeridian() {
        let origin = Point::new(0.0, 179.9999).unwrap();
        let p = destination(&origin, 90.0, 1_000.0);
        assert!(p.longitude() < 0.0);
        assert!(p.longitude() >= -180.0);
    }

    #[test]
    fn test_point_rejects_out_of_range() {
        assert!(matches!(
            Point::new(91.0, 0.0),
            Err(GeofenceError::InvalidCoordinate { field: "latitude", .. })
        ));
        assert!(matches!(
            Point::new(28.738712, 779.116145),
            Err(GeofenceError::InvalidCoordinate { field: "longitude", .. })
        ));
        assert!(Point::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_point_missing_coordinate_fails_fast() {
        assert!(matches!(
            Point::from_optional(None, Some(77.1)),
            Err(GeofenceError::MissingCoordinate("latitude"))
        ));
        assert!(matches!(
            Point::from_optional(Some(28.7), None),
            Err(GeofenceError::MissingCoordinate("longitude"))
        ));
    }

    #[test]
    fn test_point_deserialize_validates() {
        let p: Point = serde_json::from_str(r#"{"latitude": 28.7, "longitude": 77.1}"#).unwrap();
        assert_eq!(p.latitude(), 28.7);

        assert!(serde_json::from_str::<Point>(r#"{"latitude": 28.7}"#).is_err());
        assert!(serde_json::from_str::<Point>(r#"{"latitude": 128.7, "longitude": 0}"#).is_err());
    }

    #[test]
    fn test_haversine_antipodal_is_finite() {
        let a = Point::new(-70.07006889999775, 50.20913469489892).unwrap();
        let b = Point::new(70.07006889999775, -129.79086530510108).unwrap();
        let dist = haversine_m(&a, &b);
        assert!(dist.is_finite());
        assert!((dist - PI * EARTH_RADIUS_M).abs() < 1.0);

        let north = Point::new(90.0, 0.0).unwrap();
        let south = Point::new(-90.0, 0.0).unwrap();
        assert!((haversine_m(&north, &south) - PI * EARTH_RADIUS_M).abs() < 1.0);
    }
}
