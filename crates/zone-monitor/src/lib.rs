//! Zone Monitor
//!
//! Polls a location provider on a fixed cadence, classifies each fix
//! against the zone table and notifies once per change of zone kind.
//!
//! ```text
//! tick ──▶ acquire(seq) ──▶ classify ──▶ changed? ──▶ notify
//!            (async,           (pure)      (edge
//!          may overlap)                   trigger)
//! ```
//!
//! Acquisitions may outlive the interval. A fix whose sequence number is
//! not newer than the last classified one is discarded.

use thiserror::Error;

pub mod monitor;
pub mod provider;

pub use monitor::{
    ChannelNotifier, MonitorConfig, MonitorSummary, Notifier, StatusUpdate, TracingNotifier,
    ZoneMonitor,
};
pub use provider::{
    LocationProvider, PositionFix, ProviderError, ReplayProvider, StaticProvider, TrackSample,
};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Geofence(#[from] geofence::GeofenceError),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
