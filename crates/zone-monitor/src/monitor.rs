//! Polling loop and edge-triggered notification

use crate::provider::{LocationProvider, PositionFix, ProviderError};
use geofence::{Classification, TransitionDetector, ZoneEvaluator, ZoneKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default polling cadence (ms)
pub const DEFAULT_INTERVAL_MS: u64 = 5_000;

/// Default bound on one acquisition (ms)
pub const DEFAULT_ACQUISITION_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub acquisition_timeout: Duration,
    /// Stop issuing polls after this many; `None` runs until the provider is exhausted
    pub max_cycles: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            acquisition_timeout: Duration::from_millis(DEFAULT_ACQUISITION_TIMEOUT_MS),
            max_cycles: None,
        }
    }
}

/// Result of one classified poll, handed to the notifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub seq: u64,
    pub fix: PositionFix,
    pub classification: Classification,
    pub previous: ZoneKind,
    pub has_changed: bool,
}

/// Downstream consumer of classifications (alerts, toasts, logs)
pub trait Notifier: Send + Sync {
    fn notify(&self, update: &StatusUpdate);
}

/// Logs transitions; steady-state polls only at debug
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, update: &StatusUpdate) {
        let kind = update.classification.kind;
        if !update.has_changed {
            debug!("#{} {} still {}", update.seq, update.fix.point, kind);
            return;
        }

        let zone = update.classification.zone_name.as_deref().unwrap_or("unnamed");
        if kind.is_alerting() {
            warn!(
                "#{} entered {} zone {} at {} (was {})",
                update.seq, kind, zone, update.fix.point, update.previous
            );
        } else {
            info!(
                "#{} back in safe area at {} (was {})",
                update.seq, update.fix.point, update.previous
            );
        }
    }
}

/// Forwards every update over a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<StatusUpdate>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, update: &StatusUpdate) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(update.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorSummary {
    pub cycles: u64,
    pub classified: u64,
    pub stale: u64,
    pub failures: u64,
    pub transitions: u64,
}

/// Holds the only mutable state of the loop: the last classification
#[derive(Debug)]
pub struct ZoneMonitor {
    evaluator: Arc<ZoneEvaluator>,
    detector: TransitionDetector<ZoneKind>,
    last_seq: Option<u64>,
    last: Classification,
    summary: MonitorSummary,
}

impl ZoneMonitor {
    pub fn new(evaluator: Arc<ZoneEvaluator>) -> Self {
        Self {
            evaluator,
            detector: TransitionDetector::new(ZoneKind::Green),
            last_seq: None,
            last: Classification::safe(),
            summary: MonitorSummary::default(),
        }
    }

    pub fn last_classification(&self) -> &Classification {
        &self.last
    }

    pub fn summary(&self) -> &MonitorSummary {
        &self.summary
    }

    /// Classify a fix acquired by poll `seq`. Returns `None` when a newer
    /// poll has already been classified.
    pub fn observe(&mut self, seq: u64, fix: PositionFix) -> Option<StatusUpdate> {
        if self.last_seq.is_some_and(|last| seq <= last) {
            debug!("#{} arrived after a newer fix, discarded", seq);
            self.summary.stale += 1;
            return None;
        }
        self.last_seq = Some(seq);

        let classification = self.evaluator.classify(&fix.point);
        let previous = *self.detector.current();
        let has_changed = self.detector.observe(classification.kind).is_some();

        self.summary.classified += 1;
        if has_changed {
            self.summary.transitions += 1;
        }
        self.last = classification.clone();

        Some(StatusUpdate {
            seq,
            fix,
            classification,
            previous,
            has_changed,
        })
    }

    /// A failed acquisition leaves the previous classification in place
    pub fn record_failure(&mut self, seq: u64, error: &ProviderError) {
        self.summary.failures += 1;
        warn!(
            "#{} location unavailable: {} (keeping {})",
            seq, error, self.last.kind
        );
    }

    /// Poll `provider` every `config.interval` until `max_cycles` polls have
    /// been issued or the provider is exhausted, then drain in-flight polls.
    pub async fn run<P, N>(
        &mut self,
        provider: Arc<P>,
        notifier: &N,
        config: &MonitorConfig,
    ) -> MonitorSummary
    where
        P: LocationProvider + ?Sized + 'static,
        N: Notifier + ?Sized,
    {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight = JoinSet::new();
        let mut seq = 0u64;
        let mut provider_done = false;

        info!(
            "Monitoring {} zones every {:?}",
            self.evaluator.zones().len(),
            config.interval
        );

        loop {
            let stop_polling =
                provider_done || config.max_cycles.is_some_and(|max| seq >= max);
            if stop_polling && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                _ = ticker.tick(), if !stop_polling => {
                    seq += 1;
                    self.summary.cycles += 1;

                    let provider = Arc::clone(&provider);
                    let timeout = config.acquisition_timeout;
                    let poll = seq;
                    in_flight.spawn(async move {
                        let result = tokio::time::timeout(timeout, provider.current_position())
                            .await
                            .unwrap_or(Err(ProviderError::Timeout));
                        (poll, result)
                    });
                }
                Some(joined) = in_flight.join_next() => match joined {
                    Ok((poll, Ok(fix))) => {
                        if let Some(update) = self.observe(poll, fix) {
                            notifier.notify(&update);
                        }
                    }
                    Ok((_, Err(ProviderError::Exhausted))) => {
                        if !provider_done {
                            info!("Location provider exhausted after {} polls", seq);
                        }
                        provider_done = true;
                    }
                    Ok((poll, Err(e))) => self.record_failure(poll, &e),
                    Err(e) => {
                        self.summary.failures += 1;
                        warn!("Acquisition task failed: {}", e);
                    }
                },
                else => break,
            }
        }

        info!(
            "Monitor stopped: {} polls, {} classified, {} transitions, {} stale, {} failed",
            self.summary.cycles,
            self.summary.classified,
            self.summary.transitions,
            self.summary.stale,
            self.summary.failures
        );
        self.summary.clone()
    }
}
