//! Zone evaluation: which zone (if any) a point occupies

use crate::{haversine_m, GeofenceError, Point, Result, Zone, ZoneKind, ZoneSet};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How to choose among several zones containing the same point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainmentPolicy {
    /// Earliest containing zone in list order
    #[default]
    FirstMatch,
    /// Highest-severity containing zone; equal severities resolve to list order
    MostSevere,
}

impl FromStr for ContainmentPolicy {
    type Err = GeofenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first-match" => Ok(Self::FirstMatch),
            "most-severe" => Ok(Self::MostSevere),
            other => Err(GeofenceError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Outcome of classifying one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ZoneKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}

impl Classification {
    /// Safe baseline: no containing zone
    pub fn safe() -> Self {
        Self {
            kind: ZoneKind::Green,
            zone_name: None,
            zone_index: None,
            distance_m: None,
        }
    }

    fn from_zone(index: usize, zone: &Zone, distance_m: f64) -> Self {
        Self {
            kind: zone.kind,
            zone_name: zone.name.clone(),
            zone_index: Some(index),
            distance_m: Some(distance_m),
        }
    }

    /// True when no zone contains the point. A point inside a green zone
    /// is not unzoned even though its kind is the safe baseline.
    pub fn is_unzoned(&self) -> bool {
        self.zone_index.is_none()
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::safe()
    }
}

/// Classifies positions against an immutable zone table
#[derive(Debug, Clone)]
pub struct ZoneEvaluator {
    zones: ZoneSet,
    policy: ContainmentPolicy,
}

impl ZoneEvaluator {
    pub fn new(zones: ZoneSet) -> Self {
        Self {
            zones,
            policy: ContainmentPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ContainmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn policy(&self) -> ContainmentPolicy {
        self.policy
    }

    /// Every zone containing `point`, in list order, with its distance
    pub fn containing<'a>(
        &'a self,
        point: &'a Point,
    ) -> impl Iterator<Item = (usize, &'a Zone, f64)> + 'a {
        containing(&self.zones, point)
    }

    pub fn classify(&self, point: &Point) -> Classification {
        let hit = match self.policy {
            ContainmentPolicy::FirstMatch => self.containing(point).next(),
            // Strictly-greater fold keeps the earliest zone on equal severity
            ContainmentPolicy::MostSevere => self.containing(point).fold(
                None,
                |best: Option<(usize, &Zone, f64)>, hit| match best {
                    Some((_, z, _)) if hit.1.kind <= z.kind => best,
                    _ => Some(hit),
                },
            ),
        };

        to_classification(hit)
    }

    /// Classify raw coordinates, failing fast on missing or invalid input
    pub fn classify_coords(
        &self,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Classification> {
        let point = Point::from_optional(latitude, longitude)?;
        Ok(self.classify(&point))
    }
}

/// The single containment rule: inclusive boundary, list order
fn containing<'a>(
    zones: &'a ZoneSet,
    point: &'a Point,
) -> impl Iterator<Item = (usize, &'a Zone, f64)> + 'a {
    zones.iter().enumerate().filter_map(move |(i, zone)| {
        let dist = haversine_m(&zone.center, point);
        (dist <= zone.radius_m).then_some((i, zone, dist))
    })
}

fn to_classification(hit: Option<(usize, &Zone, f64)>) -> Classification {
    match hit {
        Some((index, zone, dist)) => Classification::from_zone(index, zone, dist),
        None => Classification::safe(),
    }
}

/// First-match classification of `point` against `zones`
pub fn classify(point: &Point, zones: &ZoneSet) -> Classification {
    to_classification(containing(zones, point).next())
}
