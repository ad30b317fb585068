//! GeoJSON overlays for map views

use crate::fleet::FleetSnapshot;
use crate::{Point, ZoneSet};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

fn point_feature(point: &Point, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![
            point.longitude(),
            point.latitude(),
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn object(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Zone centres with radius, kind and overlay colour, in list order
pub fn zones_to_geojson(zones: &ZoneSet) -> FeatureCollection {
    let features = zones
        .iter()
        .enumerate()
        .map(|(i, zone)| {
            point_feature(
                &zone.center,
                object(json!({
                    "index": i,
                    "name": zone.name,
                    "kind": zone.kind,
                    "radius_m": zone.radius_m,
                    "color": zone.kind.color(),
                })),
            )
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Positioned subjects plus alert locations; subjects without a fix are omitted
pub fn snapshot_to_geojson(snapshot: &FleetSnapshot) -> FeatureCollection {
    let subjects = snapshot.subjects.iter().filter_map(|s| {
        let position = s.position.as_ref()?;
        Some(point_feature(
            position,
            object(json!({
                "type": "subject",
                "id": s.id,
                "name": s.name,
                "status": s.status,
                "zone_kind": s.classification.as_ref().map(|c| c.kind),
                "zone_name": s.classification.as_ref().and_then(|c| c.zone_name.clone()),
            })),
        ))
    });

    let alerts = snapshot.alerts.iter().map(|a| {
        point_feature(
            &a.position,
            object(json!({
                "type": "alert",
                "id": a.id,
                "kind": a.kind,
                "subject_id": a.subject_id,
                "message": a.message,
                "status": a.status,
                "timestamp": a.timestamp.to_rfc3339(),
            })),
        )
    });

    FeatureCollection {
        bbox: None,
        features: subjects.chain(alerts).collect(),
        foreign_members: Some(object(json!({
            "metadata": {
                "generated_at": snapshot.generated_at.to_rfc3339(),
                "summary": snapshot.summary(),
            }
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::SubjectReport;
    use crate::{FleetAssessor, Zone, ZoneEvaluator, ZoneKind};
    use chrono::Utc;

    fn zones() -> ZoneSet {
        let center = Point::new(28.74996, 77.117455).unwrap();
        ZoneSet::new(vec![
            Zone::new(Some("Old Fort".into()), center, 100.0, ZoneKind::Restricted).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_zones_to_geojson() {
        let fc = zones_to_geojson(&zones());
        assert_eq!(fc.features.len(), 1);

        let value = serde_json::to_value(&fc).unwrap();
        let feature = &value["features"][0];
        assert_eq!(feature["geometry"]["coordinates"][0], 77.117455);
        assert_eq!(feature["geometry"]["coordinates"][1], 28.74996);
        assert_eq!(feature["properties"]["color"], "gray");
        assert_eq!(feature["properties"]["kind"], "restricted");
    }

    #[test]
    fn test_snapshot_to_geojson_skips_unpositioned() {
        let inside = Point::new(28.74996, 77.117455).unwrap();
        let subjects = vec![
            SubjectReport {
                id: "t1".into(),
                name: "Asha".into(),
                position: Some(inside),
                last_sos: false,
                updated_at: None,
            },
            SubjectReport {
                id: "t2".into(),
                name: "Ben".into(),
                position: None,
                last_sos: false,
                updated_at: None,
            },
        ];
        let snapshot =
            FleetAssessor::new(ZoneEvaluator::new(zones())).assess(&subjects, &[], Utc::now());

        let fc = snapshot_to_geojson(&snapshot);
        // One subject and its geofence alert
        assert_eq!(fc.features.len(), 2);

        let value = serde_json::to_value(&fc).unwrap();
        assert_eq!(value["features"][0]["properties"]["status"], "warning");
        assert_eq!(value["features"][1]["properties"]["id"], "GEO-t1");
        assert_eq!(value["metadata"]["summary"]["total"], 2);
    }
}
