//! Location providers

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geofence::Point;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// A position sample with the time it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub point: Point,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn now(point: Point) -> Self {
        Self {
            point,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Position unavailable: {0}")]
    Unavailable(String),
    #[error("Position acquisition timed out")]
    Timeout,
    #[error("No more positions")]
    Exhausted,
}

/// Source of subject positions (device GPS, backend feed, replay)
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> std::result::Result<PositionFix, ProviderError>;
}

/// Always reports the same point
#[derive(Debug, Clone, Copy)]
pub struct StaticProvider {
    point: Point,
}

impl StaticProvider {
    pub fn new(point: Point) -> Self {
        Self { point }
    }

    /// Fixed position from raw coordinates, rejecting missing or invalid ones
    pub fn from_coords(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self> {
        Ok(Self::new(Point::from_optional(latitude, longitude)?))
    }
}

#[async_trait]
impl LocationProvider for StaticProvider {
    async fn current_position(&self) -> std::result::Result<PositionFix, ProviderError> {
        Ok(PositionFix::now(self.point))
    }
}

/// One entry of a recorded or simulated track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Simulated acquisition latency
    #[serde(default)]
    pub delay_ms: u64,
    /// Simulated acquisition failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrackSample {
    pub fn at(point: Point) -> Self {
        Self {
            lat: Some(point.latitude()),
            lng: Some(point.longitude()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Replays a track, one sample per acquisition
#[derive(Debug)]
pub struct ReplayProvider {
    samples: Mutex<VecDeque<TrackSample>>,
}

impl ReplayProvider {
    pub fn new(samples: Vec<TrackSample>) -> Self {
        Self {
            samples: Mutex::new(samples.into()),
        }
    }

    /// Load track from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading track from {:?}", path);

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let samples: Vec<TrackSample> = serde_json::from_reader(reader)?;

        info!("Loaded {} track samples", samples.len());
        Ok(Self::new(samples))
    }

    pub async fn remaining(&self) -> usize {
        self.samples.lock().await.len()
    }
}

#[async_trait]
impl LocationProvider for ReplayProvider {
    async fn current_position(&self) -> std::result::Result<PositionFix, ProviderError> {
        let sample = self
            .samples
            .lock()
            .await
            .pop_front()
            .ok_or(ProviderError::Exhausted)?;

        if sample.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(sample.delay_ms)).await;
        }
        if let Some(message) = sample.error {
            return Err(ProviderError::Unavailable(message));
        }

        let point = Point::from_optional(sample.lat, sample.lng)
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(PositionFix::now(point))
    }
}
