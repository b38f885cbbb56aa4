//! Over-threshold run segmentation.

use std::ops::Range;

use wavedaq_core::Waveform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Threshold segmenter parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmenterParams {
    /// A sample is over threshold if its baseline-corrected value exceeds
    /// `point_sigma` times the baseline fluctuation.
    pub point_sigma: f64,
    /// A run is significant if its standard deviation reaches
    /// `signal_sigma` times the baseline fluctuation. Zero disables the test.
    pub signal_sigma: f64,
    /// Minimum accepted run length in samples.
    pub min_run_length: usize,
    /// A run is cut early once this many consecutive samples show no change
    /// while still over threshold. Zero disables the cutoff.
    pub flat_tail_limit: usize,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            point_sigma: 3.0,
            signal_sigma: 5.0,
            min_run_length: 3,
            flat_tail_limit: 8,
        }
    }
}

impl SegmenterParams {
    /// Sets the per-sample threshold in units of baseline fluctuation.
    #[must_use]
    pub fn with_point_sigma(mut self, point_sigma: f64) -> Self {
        self.point_sigma = point_sigma;
        self
    }

    /// Sets the run-significance threshold in units of baseline fluctuation.
    #[must_use]
    pub fn with_signal_sigma(mut self, signal_sigma: f64) -> Self {
        self.signal_sigma = signal_sigma;
        self
    }

    /// Sets the minimum accepted run length.
    #[must_use]
    pub fn with_min_run_length(mut self, min_run_length: usize) -> Self {
        self.min_run_length = min_run_length;
        self
    }

    /// Sets the flat-tail cutoff length (0 disables).
    #[must_use]
    pub fn with_flat_tail_limit(mut self, flat_tail_limit: usize) -> Self {
        self.flat_tail_limit = flat_tail_limit;
        self
    }
}

/// Finds accepted over-threshold runs inside the waveform's analysis range.
///
/// The result depends only on the sample values, the cached baseline pair
/// and the parameters; running it twice on an unmodified waveform yields
/// identical results. Accepted run indices are written, in increasing order,
/// into the waveform's over-threshold cache together with the threshold
/// integral (sum of baseline-corrected values at the accepted indices).
///
/// A run that reaches the end of the range without a following
/// sub-threshold sample is still accepted if it passes the length and
/// significance tests. A run is cut early once `flat_tail_limit`
/// consecutive samples show no change while over threshold; the remainder
/// of that stretch is skipped so a saturated tail cannot seed a second run.
pub fn segment(waveform: &mut Waveform, params: &SegmenterParams) -> Vec<Range<usize>> {
    let (start, end) = waveform.analysis_range();
    let fluctuation = waveform.baseline_rms();
    let threshold = params.point_sigma * fluctuation;

    let samples = waveform.samples();
    let baseline = waveform.baseline();
    let over = |i: usize| f64::from(samples[i]) - baseline > threshold;

    let mut runs: Vec<Range<usize>> = Vec::new();
    let mut indices: Vec<usize> = Vec::new();

    let mut i = start;
    while i < end {
        if !over(i) {
            i += 1;
            continue;
        }

        // Walk the contiguous over-threshold stretch, watching for a flat tail.
        let run_start = i;
        let mut j = i;
        let mut flat = 0usize;
        let mut cut: Option<usize> = None;
        while j < end && over(j) {
            if j > run_start && samples[j] == samples[j - 1] {
                flat += 1;
            } else {
                flat = 0;
            }
            if params.flat_tail_limit > 0 && flat >= params.flat_tail_limit {
                // First sample of the flat stretch ends the run.
                cut = Some(j + 1 - flat);
                break;
            }
            j += 1;
        }
        let run_end = cut.unwrap_or(j);
        if cut.is_some() {
            while j < end && over(j) {
                j += 1;
            }
        }

        if run_end - run_start >= params.min_run_length
            && run_sd(samples, baseline, run_start, run_end) >= params.signal_sigma * fluctuation
        {
            indices.extend(run_start..run_end);
            runs.push(run_start..run_end);
        }

        i = j.max(run_end).max(i + 1);
    }

    let integral: f64 = indices
        .iter()
        .map(|&idx| f64::from(samples[idx]) - baseline)
        .sum();
    waveform.set_over_threshold(indices, integral);
    runs
}

fn run_sd(samples: &[i16], baseline: f64, start: usize, end: usize) -> f64 {
    let n = (end - start) as f64;
    let mean = samples[start..end]
        .iter()
        .map(|&s| f64::from(s) - baseline)
        .sum::<f64>()
        / n;
    let var = samples[start..end]
        .iter()
        .map(|&s| (f64::from(s) - baseline - mean).powi(2))
        .sum::<f64>()
        / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{measure_baseline, BaselinePolicy};
    use approx::assert_abs_diff_eq;

    fn zero_params() -> SegmenterParams {
        SegmenterParams::default()
            .with_point_sigma(1.0)
            .with_signal_sigma(0.0)
            .with_min_run_length(5)
            .with_flat_tail_limit(0)
    }

    #[test]
    fn test_single_run_scenario() {
        let mut wf = Waveform::with_len(0, 512);
        measure_baseline(&mut wf, 20, 150, BaselinePolicy::MeanSd);
        assert_eq!((wf.baseline(), wf.baseline_rms()), (0.0, 0.0));

        for bin in 200..210 {
            wf.add_charge(bin, 100).unwrap();
        }
        let runs = segment(&mut wf, &zero_params());
        assert_eq!(runs, vec![200..210]);
        let expected: Vec<usize> = (200..210).collect();
        assert_eq!(wf.over_threshold(), &expected[..]);
        assert_abs_diff_eq!(wf.threshold_integral(), 1000.0);
    }

    #[test]
    fn test_idempotent() {
        let mut wf = Waveform::with_len(0, 64);
        for bin in 30..40 {
            wf.add_charge(bin, 50).unwrap();
        }
        measure_baseline(&mut wf, 0, 20, BaselinePolicy::MeanSd);
        let params = zero_params();
        let first = segment(&mut wf, &params);
        let indices: Vec<usize> = wf.over_threshold().to_vec();
        let integral = wf.threshold_integral();
        let second = segment(&mut wf, &params);
        assert_eq!(first, second);
        assert_eq!(wf.over_threshold(), &indices[..]);
        assert_abs_diff_eq!(wf.threshold_integral(), integral);
    }

    #[test]
    fn test_short_run_rejected() {
        let mut wf = Waveform::with_len(0, 64);
        for bin in 10..13 {
            wf.add_charge(bin, 80).unwrap();
        }
        let params = zero_params(); // min_run_length 5
        assert!(segment(&mut wf, &params).is_empty());
        assert!(wf.over_threshold().is_empty());
        assert_abs_diff_eq!(wf.threshold_integral(), 0.0);
    }

    #[test]
    fn test_run_at_range_end_accepted() {
        let mut wf = Waveform::with_len(0, 32);
        for (offset, bin) in (26..32).enumerate() {
            wf.add_charge(bin, 40 + offset as i16).unwrap();
        }
        let runs = segment(&mut wf, &zero_params());
        assert_eq!(runs, vec![26..32]);
    }

    #[test]
    fn test_flat_tail_cut() {
        let mut wf = Waveform::with_len(0, 64);
        // Rising edge then a long saturated plateau that never returns
        for (offset, bin) in (10..14).enumerate() {
            wf.add_charge(bin, 50 + 10 * offset as i16).unwrap();
        }
        for bin in 14..40 {
            wf.add_charge(bin, 90).unwrap();
        }
        let params = zero_params().with_min_run_length(2).with_flat_tail_limit(4);
        let runs = segment(&mut wf, &params);
        // Run cut at the start of the flat stretch; nothing re-seeded inside it
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 10);
        assert!(runs[0].end <= 18);
    }

    #[test]
    fn test_insignificant_run_rejected() {
        let mut wf = Waveform::with_len(0, 128);
        // Noisy baseline so fluctuation is non-zero
        for bin in 0..64 {
            wf.add_charge(bin, if bin % 2 == 0 { 4 } else { -4 }).unwrap();
        }
        // A long excursion barely over threshold and perfectly flat
        for bin in 80..100 {
            wf.add_charge(bin, 20).unwrap();
        }
        measure_baseline(&mut wf, 0, 64, BaselinePolicy::MeanSd);
        assert!(wf.baseline_rms() > 0.0);
        let params = SegmenterParams::default()
            .with_point_sigma(1.0)
            .with_signal_sigma(2.0)
            .with_min_run_length(5)
            .with_flat_tail_limit(0);
        // Flat run has sd 0 < 2 * fluctuation, so it is rejected
        let runs = segment(&mut wf, &params);
        assert!(runs.iter().all(|r| r.start != 80));
    }

    #[test]
    fn test_respects_analysis_window() {
        let mut wf = Waveform::with_len(0, 64);
        for bin in 5..15 {
            wf.add_charge(bin, 100).unwrap();
        }
        for bin in 40..50 {
            wf.add_charge(bin, 100).unwrap();
        }
        wf.set_window(30, 64).unwrap();
        let runs = segment(&mut wf, &zero_params());
        assert_eq!(runs, vec![40..50]);
        assert!(wf.over_threshold().iter().all(|&i| (30..64).contains(&i)));
    }
}
