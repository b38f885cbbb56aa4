//! Baseline level and fluctuation estimation.

use wavedaq_core::Waveform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Conversion from interquartile range to normal-equivalent sigma.
pub const IQR_TO_SIGMA: f64 = 1.349;

/// Baseline estimation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BaselinePolicy {
    /// Level = arithmetic mean, fluctuation = population standard deviation.
    #[default]
    MeanSd,
    /// Level = median, fluctuation = IQR / 1.349.
    MedianIqr,
    /// Discard samples outside the inner 25-75 percentile band; level =
    /// median and fluctuation = standard deviation of the retained subset.
    Trimmed,
}

/// Computes baseline level and fluctuation over `[start, end)`.
///
/// `end` beyond the sample count is clamped. A degenerate range
/// (`end <= start` after clamping) yields `(0.0, 0.0)`; it is a documented
/// edge case, not an error.
#[must_use]
pub fn compute_baseline(
    samples: &[i16],
    start: usize,
    end: usize,
    policy: BaselinePolicy,
) -> (f64, f64) {
    let end = end.min(samples.len());
    let start = start.min(end);
    if end <= start {
        return (0.0, 0.0);
    }

    let range: Vec<f64> = samples[start..end].iter().map(|&s| f64::from(s)).collect();

    match policy {
        BaselinePolicy::MeanSd => (mean(&range), population_sd(&range, mean(&range))),
        BaselinePolicy::MedianIqr => {
            let mut sorted = range;
            sorted.sort_by(f64::total_cmp);
            let q1 = quantile_sorted(&sorted, 0.25);
            let q3 = quantile_sorted(&sorted, 0.75);
            (quantile_sorted(&sorted, 0.5), (q3 - q1) / IQR_TO_SIGMA)
        }
        BaselinePolicy::Trimmed => {
            let mut sorted = range.clone();
            sorted.sort_by(f64::total_cmp);
            let q1 = quantile_sorted(&sorted, 0.25);
            let q3 = quantile_sorted(&sorted, 0.75);
            let retained: Vec<f64> = range.into_iter().filter(|&v| v >= q1 && v <= q3).collect();
            if retained.is_empty() {
                return (quantile_sorted(&sorted, 0.5), 0.0);
            }
            let mut retained_sorted = retained.clone();
            retained_sorted.sort_by(f64::total_cmp);
            let level = quantile_sorted(&retained_sorted, 0.5);
            (level, population_sd(&retained, mean(&retained)))
        }
    }
}

/// Computes the baseline over `[start, end)` and writes the waveform's
/// cached baseline fields. Raw samples are not altered.
pub fn measure_baseline(
    waveform: &mut Waveform,
    start: usize,
    end: usize,
    policy: BaselinePolicy,
) -> (f64, f64) {
    let (level, fluctuation) = compute_baseline(waveform.samples(), start, end, policy);
    waveform.set_baseline(level, fluctuation);
    (level, fluctuation)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_sd(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linear-interpolation quantile of an already sorted slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_degenerate_range_is_zero_pair() {
        let samples = vec![5i16; 32];
        for policy in [
            BaselinePolicy::MeanSd,
            BaselinePolicy::MedianIqr,
            BaselinePolicy::Trimmed,
        ] {
            assert_eq!(compute_baseline(&samples, 10, 10, policy), (0.0, 0.0));
            assert_eq!(compute_baseline(&samples, 12, 3, policy), (0.0, 0.0));
            // Start beyond the trace clamps to an empty range
            assert_eq!(compute_baseline(&samples, 40, 50, policy), (0.0, 0.0));
        }
    }

    #[test]
    fn test_end_is_clamped() {
        let samples = vec![4i16; 8];
        let (level, rms) = compute_baseline(&samples, 0, 1000, BaselinePolicy::MeanSd);
        assert_abs_diff_eq!(level, 4.0);
        assert_abs_diff_eq!(rms, 0.0);
    }

    #[test]
    fn test_mean_sd() {
        let samples = vec![1i16, 2, 3, 4];
        let (level, rms) = compute_baseline(&samples, 0, 4, BaselinePolicy::MeanSd);
        assert_abs_diff_eq!(level, 2.5);
        // Population sd of {1,2,3,4} = sqrt(1.25)
        assert_abs_diff_eq!(rms, 1.25f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_median_iqr_known_values() {
        // Sorted 0..=8: median 4, Q1 = 2, Q3 = 6
        let samples: Vec<i16> = (0..9).collect();
        let (level, rms) = compute_baseline(&samples, 0, 9, BaselinePolicy::MedianIqr);
        assert_abs_diff_eq!(level, 4.0);
        assert_abs_diff_eq!(rms, 4.0 / IQR_TO_SIGMA, epsilon = 1e-12);
    }

    #[test]
    fn test_trimmed_discards_outliers() {
        // A gross outlier must not shift the trimmed level
        let mut samples = vec![10i16; 20];
        samples[0] = 3000;
        let (level, _) = compute_baseline(&samples, 0, 20, BaselinePolicy::Trimmed);
        assert_abs_diff_eq!(level, 10.0);
    }

    #[test]
    fn test_trimmed_constant_range() {
        let samples = vec![-7i16; 16];
        let (level, rms) = compute_baseline(&samples, 0, 16, BaselinePolicy::Trimmed);
        assert_abs_diff_eq!(level, -7.0);
        assert_abs_diff_eq!(rms, 0.0);
    }

    #[test]
    fn test_measure_writes_cache() {
        let mut wf = Waveform::from_samples(0, vec![2i16; 64]);
        measure_baseline(&mut wf, 0, 64, BaselinePolicy::MeanSd);
        assert_abs_diff_eq!(wf.baseline(), 2.0);
        assert!(wf.has_baseline());
        assert_eq!(wf.samples()[0], 2);
    }
}
