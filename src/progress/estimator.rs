use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Share of the displayed upload percent driven by sent bytes
pub const UPLOAD_WEIGHT: f64 = 0.6;

/// Assumed duration of server-side processing after the bytes arrive
pub const PROCESSING_SECS: f64 = 5.0;

/// How the upload percent is derived from the bytes handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum UploadEstimate {
    /// Byte progress weighted against a fixed-duration processing phase
    Blended { weight: f64, processing_secs: f64 },
    /// Plain sent/total
    Raw,
}

impl Default for UploadEstimate {
    fn default() -> Self {
        UploadEstimate::Blended {
            weight: UPLOAD_WEIGHT,
            processing_secs: PROCESSING_SECS,
        }
    }
}

impl UploadEstimate {
    pub fn percent(&self, sent: u64, total: u64, elapsed: Duration) -> f64 {
        let fraction = sent_fraction(sent, total);
        match *self {
            UploadEstimate::Blended {
                weight,
                processing_secs,
            } => blend(fraction, elapsed.as_secs_f64(), weight, processing_secs),
            UploadEstimate::Raw => fraction * 100.0,
        }
    }
}

/// `fraction*100*0.6 + min(elapsed/5, 1)*100*0.4`, bounded to 0..=100.
pub fn blended_percent(fraction: f64, elapsed_secs: f64) -> f64 {
    blend(fraction, elapsed_secs, UPLOAD_WEIGHT, PROCESSING_SECS)
}

fn blend(fraction: f64, elapsed_secs: f64, weight: f64, processing_secs: f64) -> f64 {
    let fraction = unit(fraction);
    let weight = unit(weight);
    let processing = if processing_secs > 0.0 {
        unit(elapsed_secs.max(0.0) / processing_secs)
    } else {
        1.0
    };
    let percent = fraction * 100.0 * weight + processing * 100.0 * (1.0 - weight);
    percent.clamp(0.0, 100.0)
}

fn sent_fraction(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    unit(sent as f64 / total as f64)
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Bytes per second over the whole elapsed time, 0 before any time has passed.
pub fn transfer_speed(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blended_percent_matches_formula_over_grid() {
        for fi in 0..=10 {
            for ti in 0..=10 {
                let f = fi as f64 / 10.0;
                let t = ti as f64 / 2.0;
                let expected = f * 60.0 + (t / 5.0).min(1.0) * 40.0;
                assert!((blended_percent(f, t) - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn blended_percent_is_monotone_and_bounded() {
        let mut previous_row: Option<Vec<f64>> = None;
        for fi in 0..=20 {
            let f = fi as f64 / 20.0;
            let row: Vec<f64> = (0..=40).map(|ti| blended_percent(f, ti as f64 / 4.0)).collect();
            for pair in row.windows(2) {
                assert!(pair[1] >= pair[0]);
            }
            for value in &row {
                assert!((0.0..=100.0).contains(value));
            }
            if let Some(prev) = previous_row {
                for (a, b) in prev.iter().zip(row.iter()) {
                    assert!(b >= a);
                }
            }
            previous_row = Some(row);
        }
    }

    #[test]
    fn blended_percent_reaches_exactly_100() {
        assert_eq!(blended_percent(1.0, 5.0), 100.0);
        assert_eq!(blended_percent(1.0, 42.0), 100.0);
        assert_eq!(blended_percent(0.0, 0.0), 0.0);
    }

    #[test]
    fn blended_percent_clamps_out_of_range_inputs() {
        assert_eq!(blended_percent(3.0, 100.0), 100.0);
        assert_eq!(blended_percent(-1.0, -5.0), 0.0);
    }

    #[test]
    fn estimate_strategies_use_sent_fraction() {
        let half = Duration::from_millis(2500);
        let blended = UploadEstimate::default().percent(50, 100, half);
        assert!((blended - 50.0).abs() < 1e-9);

        let raw = UploadEstimate::Raw.percent(25, 100, half);
        assert!((raw - 25.0).abs() < 1e-9);

        // An empty body counts as fully sent.
        assert_eq!(UploadEstimate::Raw.percent(0, 0, Duration::ZERO), 100.0);
    }

    #[test]
    fn transfer_speed_is_zero_without_elapsed_time() {
        assert_eq!(transfer_speed(1024, Duration::ZERO), 0.0);
        assert_eq!(transfer_speed(2048, Duration::from_secs(2)), 1024.0);
    }
}
