//! Data loading from JSON files
//!
//! Zone tables are configuration: any bad record rejects the whole table.
//! Subject rosters and SOS feeds are live data: bad records are logged and
//! degraded or skipped, never patched with placeholder coordinates.

use crate::fleet::{SosReport, SubjectReport};
use crate::zone::ZoneRecord;
use crate::{GeofenceError, Point, Result, Zone, ZoneSet};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Zone table compiled into the binary
const EMBEDDED_ZONES: &str = include_str!("../data/zones.json");

/// Sanitize ID to prevent injection (alphanumeric, dash, underscore only)
fn sanitize_id(id: String) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(128)
        .collect()
}

/// Sanitize name (allow more chars but still limit)
fn sanitize_name(name: String) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || " -_.,()&'".contains(*c))
        .take(256)
        .collect()
}

/// Raw subject record from the tracking backend
#[derive(Debug, Deserialize)]
struct RawSubject {
    id: Option<serde_json::Value>,
    name: Option<String>,
    #[serde(rename = "currentLat")]
    current_lat: Option<f64>,
    #[serde(rename = "currentLng")]
    current_lng: Option<f64>,
    #[serde(rename = "lastSOS")]
    last_sos: Option<serde_json::Value>,
    created_at: Option<String>,
}

/// Raw SOS record from the tracking backend
#[derive(Debug, Deserialize)]
struct RawSos {
    id: Option<serde_json::Value>,
    #[serde(rename = "touristId")]
    subject_id: Option<serde_json::Value>,
    lat: Option<f64>,
    lng: Option<f64>,
    timestamp: Option<String>,
}

/// Ids arrive as either JSON strings or numbers
fn value_to_id(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// JavaScript-style truthiness of the backend's `lastSOS` field
fn is_truthy(value: &Option<serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Parse and validate a zone table
pub fn parse_zones(json: &str) -> Result<ZoneSet> {
    let raw: Vec<ZoneRecord> = serde_json::from_str(json)?;

    let zones = raw
        .into_iter()
        .enumerate()
        .map(|(index, z)| {
            Zone::try_from(z).map_err(|e| GeofenceError::InvalidZone {
                index,
                source: Box::new(e),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    ZoneSet::new(zones)
}

/// Load zone table from JSON file
pub fn load_zones(path: impl AsRef<Path>) -> Result<ZoneSet> {
    let path = path.as_ref();
    info!("Loading zones from {:?}", path);

    let json = std::fs::read_to_string(path)?;
    let zones = parse_zones(&json)?;

    info!("Loaded {} zones", zones.len());
    Ok(zones)
}

/// The default zone table shipped with the crate
pub fn embedded_zones() -> Result<ZoneSet> {
    parse_zones(EMBEDDED_ZONES)
}

/// Parse a subject roster
pub fn parse_subjects(json: &str) -> Result<Vec<SubjectReport>> {
    let raw: Vec<RawSubject> = serde_json::from_str(json)?;
    Ok(convert_subjects(raw))
}

/// Load subject roster from JSON file
pub fn load_subjects(path: impl AsRef<Path>) -> Result<Vec<SubjectReport>> {
    let path = path.as_ref();
    info!("Loading subjects from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: Vec<RawSubject> = serde_json::from_reader(reader)?;
    Ok(convert_subjects(raw))
}

fn convert_subjects(raw: Vec<RawSubject>) -> Vec<SubjectReport> {
    let mut subjects = Vec::with_capacity(raw.len());
    let mut without_fix = 0;

    for (i, s) in raw.into_iter().enumerate() {
        let id = sanitize_id(value_to_id(s.id).unwrap_or_else(|| format!("subject-{}", i)));

        let position = match (s.current_lat, s.current_lng) {
            (None, None) => None,
            (lat, lng) => match Point::from_optional(lat, lng) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Subject {}: discarding position: {}", id, e);
                    None
                }
            },
        };
        if position.is_none() {
            without_fix += 1;
        }

        subjects.push(SubjectReport {
            id,
            name: sanitize_name(s.name.unwrap_or_else(|| "Unknown".to_string())),
            position,
            last_sos: is_truthy(&s.last_sos),
            updated_at: parse_timestamp(s.created_at.as_deref()),
        });
    }

    info!(
        "Loaded {} subjects ({} without a position)",
        subjects.len(),
        without_fix
    );
    subjects
}

/// Parse SOS reports
pub fn parse_sos_reports(json: &str) -> Result<Vec<SosReport>> {
    let raw: Vec<RawSos> = serde_json::from_str(json)?;
    Ok(convert_sos(raw))
}

/// Load SOS reports from JSON file
pub fn load_sos_reports(path: impl AsRef<Path>) -> Result<Vec<SosReport>> {
    let path = path.as_ref();
    info!("Loading SOS reports from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: Vec<RawSos> = serde_json::from_reader(reader)?;
    Ok(convert_sos(raw))
}

fn convert_sos(raw: Vec<RawSos>) -> Vec<SosReport> {
    let mut reports = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for (i, r) in raw.into_iter().enumerate() {
        let id = sanitize_id(value_to_id(r.id).unwrap_or_else(|| i.to_string()));
        let Some(subject_id) = value_to_id(r.subject_id).map(sanitize_id) else {
            warn!("SOS {}: missing subject id, skipped", id);
            skipped += 1;
            continue;
        };
        let position = match Point::from_optional(r.lat, r.lng) {
            Ok(p) => p,
            Err(e) => {
                warn!("SOS {}: {}, skipped", id, e);
                skipped += 1;
                continue;
            }
        };

        reports.push(SosReport {
            id,
            subject_id,
            position,
            timestamp: parse_timestamp(r.timestamp.as_deref()).unwrap_or_else(Utc::now),
        });
    }

    info!(
        "Loaded {} SOS reports ({} skipped)",
        reports.len(),
        skipped
    );
    reports
}
