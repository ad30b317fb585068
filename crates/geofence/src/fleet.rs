//! Fleet assessment for the monitoring dashboard
//!
//! Combines the subject roster, outstanding SOS reports and zone
//! classification into a per-subject status plus an alert list.

use crate::{Classification, Point, Transition, TransitionDetector, ZoneEvaluator, ZoneKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Dashboard status of a tracked subject
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    #[default]
    Safe,
    Warning,
    Emergency,
}

/// A subject as reported by the tracking backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectReport {
    pub id: String,
    pub name: String,
    /// Last known position; `None` when the subject has never reported one
    pub position: Option<Point>,
    pub last_sos: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// An SOS raised by a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosReport {
    pub id: String,
    pub subject_id: String,
    pub position: Point,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Sos,
    Geofence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub subject_id: String,
    pub subject_name: String,
    pub message: String,
    pub position: Point,
    pub timestamp: DateTime<Utc>,
    pub status: AlertStatus,
}

/// A subject after zone evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessedSubject {
    pub id: String,
    pub name: String,
    pub position: Option<Point>,
    pub status: SubjectStatus,
    /// `None` when there is no position to classify
    pub classification: Option<Classification>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total: usize,
    pub safe: usize,
    pub warning: usize,
    pub emergency: usize,
    pub active_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub subjects: Vec<AssessedSubject>,
    pub alerts: Vec<Alert>,
    pub generated_at: DateTime<Utc>,
}

impl FleetSnapshot {
    pub fn summary(&self) -> FleetSummary {
        let mut summary = FleetSummary {
            total: self.subjects.len(),
            active_alerts: self
                .alerts
                .iter()
                .filter(|a| a.status == AlertStatus::Active)
                .count(),
            ..Default::default()
        };
        for s in &self.subjects {
            match s.status {
                SubjectStatus::Safe => summary.safe += 1,
                SubjectStatus::Warning => summary.warning += 1,
                SubjectStatus::Emergency => summary.emergency += 1,
            }
        }
        summary
    }
}

/// Builds dashboard snapshots from backend reports
#[derive(Debug, Clone)]
pub struct FleetAssessor {
    evaluator: ZoneEvaluator,
}

impl FleetAssessor {
    pub fn new(evaluator: ZoneEvaluator) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &ZoneEvaluator {
        &self.evaluator
    }

    pub fn assess(
        &self,
        subjects: &[SubjectReport],
        sos: &[SosReport],
        now: DateTime<Utc>,
    ) -> FleetSnapshot {
        let names: HashMap<&str, &str> = subjects
            .iter()
            .map(|s| (s.id.as_str(), s.name.as_str()))
            .collect();

        let mut alerts: Vec<Alert> = sos
            .iter()
            .map(|report| Alert {
                id: format!("SOS-{}", report.id),
                kind: AlertKind::Sos,
                subject_id: report.subject_id.clone(),
                subject_name: names
                    .get(report.subject_id.as_str())
                    .copied()
                    .unwrap_or("Unknown")
                    .to_string(),
                message: "Emergency SOS alert triggered".to_string(),
                position: report.position,
                timestamp: report.timestamp,
                status: AlertStatus::Active,
            })
            .collect();

        let mut assessed = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let (status, classification) = self.assess_subject(subject, &mut alerts, now);
            assessed.push(AssessedSubject {
                id: subject.id.clone(),
                name: subject.name.clone(),
                position: subject.position,
                status,
                classification,
                updated_at: subject.updated_at,
            });
        }

        let alerts = dedup_alerts(alerts);
        debug!(
            "Assessed {} subjects, {} alerts",
            assessed.len(),
            alerts.len()
        );

        FleetSnapshot {
            subjects: assessed,
            alerts,
            generated_at: now,
        }
    }

    fn assess_subject(
        &self,
        subject: &SubjectReport,
        alerts: &mut Vec<Alert>,
        now: DateTime<Utc>,
    ) -> (SubjectStatus, Option<Classification>) {
        let base = if subject.last_sos {
            SubjectStatus::Emergency
        } else if subject.position.is_some() {
            SubjectStatus::Safe
        } else {
            SubjectStatus::Warning
        };

        let Some(position) = subject.position else {
            return (base, None);
        };

        let classification = self.evaluator.classify(&position);
        if classification.kind.is_alerting() {
            alerts.push(Alert {
                id: format!("GEO-{}", subject.id),
                kind: AlertKind::Geofence,
                subject_id: subject.id.clone(),
                subject_name: subject.name.clone(),
                message: format!(
                    "Entered {} zone: {}",
                    classification.kind,
                    classification.zone_name.as_deref().unwrap_or("unnamed")
                ),
                position,
                timestamp: now,
                status: AlertStatus::Active,
            });
        }

        // Zones only ever raise the status
        let status = base.max(classification.kind.subject_status());
        (status, Some(classification))
    }
}

/// Deduplicate by id: first occurrence keeps its slot, last value wins
pub fn dedup_alerts(alerts: Vec<Alert>) -> Vec<Alert> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Alert> = Vec::with_capacity(alerts.len());

    for alert in alerts {
        match index.get(&alert.id) {
            Some(&i) => unique[i] = alert,
            None => {
                index.insert(alert.id.clone(), unique.len());
                unique.push(alert);
            }
        }
    }

    unique
}

/// Alert list that survives refreshes while remembering operator resolutions
#[derive(Debug, Clone, Default)]
pub struct AlertBoard {
    alerts: Vec<Alert>,
    resolved: HashSet<String>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a fresh alert list. Resolutions persist only for ids that
    /// are still present; an id that disappears and comes back is active.
    pub fn replace(&mut self, alerts: Vec<Alert>) {
        let present: HashSet<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
        self.resolved.retain(|id| present.contains(id.as_str()));

        self.alerts = alerts
            .into_iter()
            .map(|mut a| {
                if self.resolved.contains(&a.id) {
                    a.status = AlertStatus::Resolved;
                }
                a
            })
            .collect();
    }

    /// Mark an alert resolved. Returns false for unknown ids.
    pub fn resolve(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.status = AlertStatus::Resolved;
                self.resolved.insert(id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
    }

    pub fn all(&self) -> &[Alert] {
        &self.alerts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectTransition {
    pub subject_id: String,
    pub subject_name: String,
    pub zone_name: Option<String>,
    pub transition: Transition<ZoneKind>,
}

/// Edge-triggered zone changes across successive snapshots
#[derive(Debug, Default)]
pub struct FleetTracker {
    detectors: HashMap<String, TransitionDetector<ZoneKind>>,
}

impl FleetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subjects without a classification keep their previous state.
    /// Subjects absent from the snapshot are forgotten.
    pub fn update(&mut self, snapshot: &FleetSnapshot) -> Vec<SubjectTransition> {
        let present: HashSet<&str> = snapshot.subjects.iter().map(|s| s.id.as_str()).collect();
        self.detectors.retain(|id, _| present.contains(id.as_str()));

        let mut transitions = Vec::new();
        for subject in &snapshot.subjects {
            let Some(classification) = &subject.classification else {
                continue;
            };
            let detector = self
                .detectors
                .entry(subject.id.clone())
                .or_insert_with(|| TransitionDetector::new(ZoneKind::Green));

            if let Some(transition) = detector.observe(classification.kind) {
                transitions.push(SubjectTransition {
                    subject_id: subject.id.clone(),
                    subject_name: subject.name.clone(),
                    zone_name: classification.zone_name.clone(),
                    transition,
                });
            }
        }
        transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{destination, Zone, ZoneSet};

    fn center() -> Point {
        Point::new(28.74996, 77.117455).unwrap()
    }

    fn assessor() -> FleetAssessor {
        let zones = ZoneSet::new(vec![
            Zone::new(Some("Old Fort".into()), center(), 100.0, ZoneKind::Red).unwrap(),
            Zone::new(Some("Market".into()), center(), 1_000.0, ZoneKind::Yellow).unwrap(),
        ])
        .unwrap();
        FleetAssessor::new(ZoneEvaluator::new(zones))
    }

    fn subject(id: &str, position: Option<Point>, last_sos: bool) -> SubjectReport {
        SubjectReport {
            id: id.to_string(),
            name: format!("Subject {}", id),
            position,
            last_sos,
            updated_at: None,
        }
    }

    #[test]
    fn test_status_from_zones() {
        let subjects = vec![
            subject("t1", Some(destination(&center(), 0.0, 50.0)), false),
            subject("t2", Some(destination(&center(), 0.0, 500.0)), false),
            subject("t3", Some(destination(&center(), 0.0, 5_000.0)), false),
        ];
        let snapshot = assessor().assess(&subjects, &[], Utc::now());

        let statuses: Vec<_> = snapshot.subjects.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                SubjectStatus::Emergency,
                SubjectStatus::Warning,
                SubjectStatus::Safe
            ]
        );
        assert_eq!(snapshot.alerts.len(), 2);
        assert_eq!(snapshot.alerts[0].id, "GEO-t1");
        assert_eq!(snapshot.alerts[0].message, "Entered red zone: Old Fort");
        assert_eq!(snapshot.alerts[1].message, "Entered yellow zone: Market");
    }

    #[test]
    fn test_missing_position_is_warning_without_classification() {
        let snapshot = assessor().assess(&[subject("t1", None, false)], &[], Utc::now());
        let s = &snapshot.subjects[0];
        assert_eq!(s.status, SubjectStatus::Warning);
        assert!(s.classification.is_none());
        assert!(s.position.is_none());
        assert!(snapshot.alerts.is_empty());
    }

    #[test]
    fn test_zone_never_lowers_sos_status() {
        let subjects = vec![subject("t1", Some(destination(&center(), 0.0, 500.0)), true)];
        let snapshot = assessor().assess(&subjects, &[], Utc::now());
        assert_eq!(snapshot.subjects[0].status, SubjectStatus::Emergency);
    }

    #[test]
    fn test_sos_alerts_resolve_names() {
        let far = destination(&center(), 0.0, 5_000.0);
        let subjects = vec![subject("t1", Some(far), true)];
        let sos = vec![
            SosReport {
                id: "1".into(),
                subject_id: "t1".into(),
                position: far,
                timestamp: Utc::now(),
            },
            SosReport {
                id: "2".into(),
                subject_id: "ghost".into(),
                position: far,
                timestamp: Utc::now(),
            },
        ];
        let snapshot = assessor().assess(&subjects, &sos, Utc::now());

        assert_eq!(snapshot.alerts.len(), 2);
        assert_eq!(snapshot.alerts[0].id, "SOS-1");
        assert_eq!(snapshot.alerts[0].subject_name, "Subject t1");
        assert_eq!(snapshot.alerts[1].subject_name, "Unknown");
        assert_eq!(snapshot.summary().emergency, 1);
        assert_eq!(snapshot.summary().active_alerts, 2);
    }

    #[test]
    fn test_dedup_alerts_keeps_first_slot_last_value() {
        let far = destination(&center(), 0.0, 5_000.0);
        let sos = vec![
            SosReport {
                id: "1".into(),
                subject_id: "t1".into(),
                position: far,
                timestamp: Utc::now(),
            },
            SosReport {
                id: "2".into(),
                subject_id: "t1".into(),
                position: far,
                timestamp: Utc::now(),
            },
            SosReport {
                id: "1".into(),
                subject_id: "t2".into(),
                position: far,
                timestamp: Utc::now(),
            },
        ];
        let snapshot = assessor().assess(&[], &sos, Utc::now());

        let ids: Vec<_> = snapshot.alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["SOS-1", "SOS-2"]);
        assert_eq!(snapshot.alerts[0].subject_id, "t2");
    }

    #[test]
    fn test_alert_board_resolution_survives_refresh() {
        let subjects = vec![subject("t1", Some(destination(&center(), 0.0, 50.0)), false)];
        let assessor = assessor();
        let mut board = AlertBoard::new();

        board.replace(assessor.assess(&subjects, &[], Utc::now()).alerts);
        assert_eq!(board.active().count(), 1);
        assert!(board.resolve("GEO-t1"));
        assert!(!board.resolve("GEO-missing"));

        board.replace(assessor.assess(&subjects, &[], Utc::now()).alerts);
        assert_eq!(board.active().count(), 0);
        assert_eq!(board.all().len(), 1);

        // Leaves the zone, then re-enters: the alert is new again
        let away = vec![subject("t1", Some(destination(&center(), 0.0, 5_000.0)), false)];
        board.replace(assessor.assess(&away, &[], Utc::now()).alerts);
        board.replace(assessor.assess(&subjects, &[], Utc::now()).alerts);
        assert_eq!(board.active().count(), 1);
    }

    #[test]
    fn test_fleet_tracker_edge_triggered() {
        let assessor = assessor();
        let mut tracker = FleetTracker::new();
        let at = |m: f64| vec![subject("t1", Some(destination(&center(), 0.0, m)), false)];

        assert!(tracker.update(&assessor.assess(&at(5_000.0), &[], Utc::now())).is_empty());
        let t = tracker.update(&assessor.assess(&at(500.0), &[], Utc::now()));
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].transition.to, ZoneKind::Yellow);
        assert_eq!(t[0].zone_name.as_deref(), Some("Market"));
        assert!(tracker.update(&assessor.assess(&at(600.0), &[], Utc::now())).is_empty());

        // No fix: previous state retained, nothing emitted
        let lost = vec![subject("t1", None, false)];
        assert!(tracker.update(&assessor.assess(&lost, &[], Utc::now())).is_empty());

        let t = tracker.update(&assessor.assess(&at(50.0), &[], Utc::now()));
        assert_eq!(t[0].transition.from, ZoneKind::Yellow);
        assert_eq!(t[0].transition.to, ZoneKind::Red);
    }
}
