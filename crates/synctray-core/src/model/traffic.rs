// ── Traffic totals and rates ──

use std::time::Duration;

use serde::Serialize;

/// Total bytes exchanged with all peers plus the derived rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Traffic {
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// kbit/s
    pub rate_in: f64,
    /// kbit/s
    pub rate_out: f64,
}

/// Transfer rate in kbit/s between two byte totals.
///
/// Yields 0 when there is no previous sample or no time has elapsed. A
/// counter that went backwards (daemon restart) also yields 0.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn transfer_rate(previous: u64, current: u64, elapsed: Option<Duration>) -> f64 {
    let Some(elapsed) = elapsed else {
        return 0.0;
    };
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 * 0.008 / secs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_without_previous_sample_is_zero() {
        assert!(transfer_rate(0, 1_000_000, None).abs() < f64::EPSILON);
    }

    #[test]
    fn rate_with_zero_elapsed_is_zero() {
        let rate = transfer_rate(0, 1_000_000, Some(Duration::ZERO));
        assert!(rate.is_finite());
        assert!(rate.abs() < f64::EPSILON);
    }

    #[test]
    fn rate_in_kbit_per_second() {
        // 125_000 bytes in 1s = 1000 kbit/s
        let rate = transfer_rate(0, 125_000, Some(Duration::from_secs(1)));
        assert!((rate - 1000.0).abs() < 1e-9);

        let rate = transfer_rate(125_000, 250_000, Some(Duration::from_secs(2)));
        assert!((rate - 500.0).abs() < 1e-9);
    }

    #[test]
    fn counter_reset_is_zero() {
        let rate = transfer_rate(500, 100, Some(Duration::from_secs(1)));
        assert!(rate.abs() < f64::EPSILON);
    }
}
