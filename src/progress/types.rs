//! Progress snapshot and phase definitions

use serde::{Deserialize, Serialize};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransferPhase {
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "preparing")]
    Preparing,
    #[serde(rename = "downloading")]
    Downloading,
}

impl std::fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferPhase::Uploading => write!(f, "uploading"),
            TransferPhase::Preparing => write!(f, "preparing"),
            TransferPhase::Downloading => write!(f, "downloading"),
        }
    }
}

/// One progress tick as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub phase: TransferPhase,
    pub percent: f64, // 0..=100
    pub speed: f64,   // bytes per second
    pub transferred_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl ProgressSnapshot {
    pub fn new(phase: TransferPhase, percent: f64, speed: f64) -> Self {
        Self {
            phase,
            percent: clamp_percent(percent),
            speed: if speed.is_finite() && speed > 0.0 {
                speed
            } else {
                0.0
            },
            transferred_bytes: 0,
            total_bytes: None,
        }
    }

    pub fn with_bytes(mut self, transferred: u64, total: Option<u64>) -> Self {
        self.transferred_bytes = transferred;
        self.total_bytes = total;
        self
    }

    /// Percent rounded to a whole number, e.g. "42%"
    pub fn percent_text(&self) -> String {
        format!("{}%", self.percent.round() as u32)
    }

    pub fn speed_text(&self) -> String {
        format_speed(self.speed)
    }
}

fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Format a transfer rate, switching from KB/s to MB/s above 1 MiB/s.
pub fn format_speed(bytes_per_second: f64) -> String {
    let speed = if bytes_per_second.is_finite() {
        bytes_per_second.max(0.0)
    } else {
        0.0
    };
    if speed > MIB {
        format!("{:.2} MB/s", speed / MIB)
    } else {
        format!("{:.2} KB/s", speed / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_speed_switches_unit_above_one_mebibyte() {
        assert_eq!(format_speed(2_097_152.0), "2.00 MB/s");
        assert_eq!(format_speed(512.0), "0.50 KB/s");
        assert_eq!(format_speed(1_048_576.0), "1024.00 KB/s");
        assert_eq!(format_speed(1_048_577.0), "1.00 MB/s");
    }

    #[test]
    fn format_speed_treats_invalid_rates_as_zero() {
        assert_eq!(format_speed(-10.0), "0.00 KB/s");
        assert_eq!(format_speed(f64::NAN), "0.00 KB/s");
        assert_eq!(format_speed(f64::INFINITY), "0.00 KB/s");
    }

    #[test]
    fn snapshot_clamps_percent_and_rounds_text() {
        let snapshot = ProgressSnapshot::new(TransferPhase::Uploading, 140.0, 10.0);
        assert_eq!(snapshot.percent, 100.0);
        assert_eq!(snapshot.percent_text(), "100%");

        let snapshot = ProgressSnapshot::new(TransferPhase::Downloading, 41.6, -1.0);
        assert_eq!(snapshot.percent_text(), "42%");
        assert_eq!(snapshot.speed, 0.0);
    }

    #[test]
    fn phase_display_matches_expected_strings() {
        assert_eq!(TransferPhase::Uploading.to_string(), "uploading");
        assert_eq!(TransferPhase::Preparing.to_string(), "preparing");
        assert_eq!(TransferPhase::Downloading.to_string(), "downloading");
    }
}
