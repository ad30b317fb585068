//! Zone model: severity kinds, circular zones and the validated zone table

use crate::{GeofenceError, Point, Result, SubjectStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Zone severity, ordered from safe baseline to most severe
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    #[default]
    Green,
    Yellow,
    Restricted,
    Red,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Restricted => "restricted",
            Self::Red => "red",
        }
    }

    /// Everything except the safe baseline raises an alert
    pub fn is_alerting(&self) -> bool {
        *self != Self::Green
    }

    /// Status a subject inside this kind of zone is raised to
    pub fn subject_status(&self) -> SubjectStatus {
        match self {
            Self::Green => SubjectStatus::Safe,
            Self::Yellow | Self::Restricted => SubjectStatus::Warning,
            Self::Red => SubjectStatus::Emergency,
        }
    }

    /// Overlay colour used by the map views
    pub fn color(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Restricted => "gray",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ZoneKind {
    type Err = GeofenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "restricted" => Ok(Self::Restricted),
            "red" => Ok(Self::Red),
            other => Err(GeofenceError::UnknownZoneKind(other.to_string())),
        }
    }
}

/// A named circular region.
///
/// Serializes as a zone table record (`name`, `lat`, `lng`, `radius`,
/// `type`), so a printed table loads back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ZoneRecord", into = "ZoneRecord")]
pub struct Zone {
    pub name: Option<String>,
    pub center: Point,
    pub radius_m: f64,
    pub kind: ZoneKind,
}

impl Zone {
    pub fn new(
        name: Option<String>,
        center: Point,
        radius_m: f64,
        kind: ZoneKind,
    ) -> Result<Self> {
        let zone = Self {
            name,
            center,
            radius_m,
            kind,
        };
        zone.validate()?;
        Ok(zone)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(GeofenceError::InvalidRadius {
                zone: self.label().to_string(),
                radius: self.radius_m,
            });
        }
        Ok(())
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

/// Zone table record, in the field names the front-end configuration used
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ZoneRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    radius: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

impl TryFrom<ZoneRecord> for Zone {
    type Error = GeofenceError;

    fn try_from(record: ZoneRecord) -> Result<Self> {
        let center = Point::from_optional(record.lat, record.lng)?;
        let kind = match record.kind {
            Some(k) => k.parse::<ZoneKind>()?,
            None => ZoneKind::Green,
        };
        let radius = record.radius.unwrap_or(f64::NAN);
        Zone::new(record.name, center, radius, kind)
    }
}

impl From<Zone> for ZoneRecord {
    fn from(zone: Zone) -> Self {
        Self {
            lat: Some(zone.center.latitude()),
            lng: Some(zone.center.longitude()),
            radius: Some(zone.radius_m),
            kind: Some(zone.kind.as_str().to_string()),
            name: zone.name,
        }
    }
}

/// Ordered, validated, immutable zone table.
///
/// List order is part of the classification contract: for overlapping
/// zones the evaluator reports the earliest containing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSet {
    zones: Arc<[Zone]>,
}

impl ZoneSet {
    pub fn new(zones: Vec<Zone>) -> Result<Self> {
        for (index, zone) in zones.iter().enumerate() {
            zone.validate().map_err(|e| GeofenceError::InvalidZone {
                index,
                source: Box::new(e),
            })?;
        }
        Ok(Self {
            zones: zones.into(),
        })
    }

    pub fn empty() -> Self {
        Self {
            zones: Vec::<Zone>::new().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn as_slice(&self) -> &[Zone] {
        &self.zones
    }
}

impl Serialize for ZoneSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.zones.iter())
    }
}

impl<'a> IntoIterator for &'a ZoneSet {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
