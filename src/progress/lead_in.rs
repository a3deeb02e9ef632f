use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::{ProgressSnapshot, TransferPhase};
use crate::error::TransferError;

/// Rate the synthetic speed figure is scaled against (1 MiB/s)
const SYNTHETIC_RATE: f64 = 1024.0 * 1024.0;

/// What the user sees between asking for a download and the request starting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DownloadLeadIn {
    /// Linear 0..100% over `duration`, one update per `tick`
    Simulated { duration: Duration, tick: Duration },
    /// Start the request immediately
    Skip,
}

impl Default for DownloadLeadIn {
    fn default() -> Self {
        DownloadLeadIn::Simulated {
            duration: Duration::from_secs(3),
            tick: Duration::from_millis(100),
        }
    }
}

impl DownloadLeadIn {
    /// Drive the lead-in to completion, calling `on_tick` for every update.
    ///
    /// Returns once the simulated percent reaches 100, or `Cancelled` if the
    /// token fires first.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_tick: F) -> Result<(), TransferError>
    where
        F: FnMut(&ProgressSnapshot),
    {
        let (duration, tick) = match *self {
            DownloadLeadIn::Skip => return Ok(()),
            DownloadLeadIn::Simulated { duration, tick } => (duration, tick.max(Duration::from_millis(1))),
        };

        let start = Instant::now();
        let mut ticker = interval_at(start + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                _ = ticker.tick() => {
                    let snapshot = simulated_snapshot(start.elapsed(), duration);
                    on_tick(&snapshot);
                    if snapshot.percent >= 100.0 {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Synthetic progress after `elapsed` of a lead-in lasting `duration`.
pub fn simulated_snapshot(elapsed: Duration, duration: Duration) -> ProgressSnapshot {
    let percent = if duration.is_zero() {
        100.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64() * 100.0).min(100.0)
    };
    let elapsed_secs = match elapsed.as_secs_f64() {
        secs if secs > 0.0 => secs,
        _ => 1.0,
    };
    let speed = (percent / 100.0) * SYNTHETIC_RATE / elapsed_secs;
    ProgressSnapshot::new(TransferPhase::Preparing, percent, speed)
}
