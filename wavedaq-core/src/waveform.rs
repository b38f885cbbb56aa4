//! Waveform type: one channel's sample sequence plus derived statistics.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default trace length for most acquisition configurations.
pub const DEFAULT_TRACE_LENGTH: usize = 512;

/// One detector channel's ordered time trace.
///
/// Samples are signed fixed-width ADC counts. The sample sequence length is
/// fixed at construction (or by an explicit [`Waveform::resize`]) and is not
/// changed by any derived calculation. Baseline and threshold results are
/// cached on the waveform and survive until [`Waveform::clear_derived`] or a
/// fresh measurement overwrites them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waveform {
    id: u32,
    samples: Vec<i16>,
    /// Optional analysis window `[start, end)`, clamped to the sample count.
    window: Option<(usize, usize)>,
    baseline: f64,
    baseline_rms: f64,
    over_threshold: Vec<usize>,
    threshold_integral: f64,
}

impl Waveform {
    /// Creates an empty waveform for the given channel id.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            samples: Vec::new(),
            window: None,
            baseline: 0.0,
            baseline_rms: 0.0,
            over_threshold: Vec::new(),
            threshold_integral: 0.0,
        }
    }

    /// Creates a zero-filled waveform of the given length.
    #[must_use]
    pub fn with_len(id: u32, len: usize) -> Self {
        let mut wf = Self::new(id);
        wf.samples = vec![0; len];
        wf
    }

    /// Creates a waveform from an existing sample vector.
    #[must_use]
    pub fn from_samples(id: u32, samples: Vec<i16>) -> Self {
        let mut wf = Self::new(id);
        wf.samples = samples;
        wf
    }

    /// Channel id, unique within an event.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Number of samples.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the waveform holds no samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The raw sample sequence.
    #[inline]
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Resizes the sample sequence, zero-filling new bins.
    ///
    /// Resizing invalidates all cached derived values.
    pub fn resize(&mut self, len: usize) {
        self.samples.resize(len, 0);
        self.clear_derived();
    }

    /// Appends one sample at the end of the trace.
    pub fn push_sample(&mut self, value: i16) {
        self.samples.push(value);
    }

    /// Adds charge into an existing bin, saturating at the sample width.
    ///
    /// # Errors
    /// Returns [`Error::BinOutOfRange`] if `bin` is outside the trace.
    pub fn add_charge(&mut self, bin: usize, value: i16) -> Result<()> {
        let len = self.samples.len();
        let sample = self
            .samples
            .get_mut(bin)
            .ok_or(Error::BinOutOfRange { bin, len })?;
        *sample = sample.saturating_add(value);
        Ok(())
    }

    /// Restricts derived calculations to `[start, end)`.
    ///
    /// `end` beyond the sample count is clamped rather than rejected.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWindow`] if `start > end`.
    pub fn set_window(&mut self, start: usize, end: usize) -> Result<()> {
        if start > end {
            return Err(Error::InvalidWindow { start, end });
        }
        self.window = Some((start, end));
        Ok(())
    }

    /// Removes the analysis window restriction.
    pub fn clear_window(&mut self) {
        self.window = None;
    }

    /// Effective analysis range, clamped to the sample count.
    #[must_use]
    pub fn analysis_range(&self) -> (usize, usize) {
        match self.window {
            Some((start, end)) => (start.min(self.samples.len()), end.min(self.samples.len())),
            None => (0, self.samples.len()),
        }
    }

    /// Cached baseline level. `(0, 0)` together with
    /// [`Waveform::baseline_rms`] means "not yet measured".
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Cached baseline fluctuation.
    #[inline]
    #[must_use]
    pub fn baseline_rms(&self) -> f64 {
        self.baseline_rms
    }

    /// Returns true if the baseline fields differ from the sentinel pair.
    #[inline]
    #[must_use]
    pub fn has_baseline(&self) -> bool {
        self.baseline != 0.0 || self.baseline_rms != 0.0
    }

    /// Overwrites the cached baseline fields. Raw samples are untouched.
    pub fn set_baseline(&mut self, level: f64, fluctuation: f64) {
        self.baseline = level;
        self.baseline_rms = fluctuation;
    }

    /// Baseline-corrected value of one sample.
    #[inline]
    #[must_use]
    pub fn corrected(&self, index: usize) -> f64 {
        f64::from(self.samples[index]) - self.baseline
    }

    /// Cached over-threshold sample indices, in increasing order.
    #[inline]
    #[must_use]
    pub fn over_threshold(&self) -> &[usize] {
        &self.over_threshold
    }

    /// Cached threshold integral.
    #[inline]
    #[must_use]
    pub fn threshold_integral(&self) -> f64 {
        self.threshold_integral
    }

    /// Overwrites the cached over-threshold indices and their integral.
    ///
    /// The index list must be non-decreasing and inside the analysis range;
    /// the segmenter upholds this.
    pub fn set_over_threshold(&mut self, indices: Vec<usize>, integral: f64) {
        debug_assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        self.over_threshold = indices;
        self.threshold_integral = integral;
    }

    /// Resets every cached derived value to its uninitialized state.
    pub fn clear_derived(&mut self) {
        self.baseline = 0.0;
        self.baseline_rms = 0.0;
        self.over_threshold.clear();
        self.threshold_integral = 0.0;
    }

    /// Largest sample in the trace.
    #[must_use]
    pub fn max_sample(&self) -> Option<i16> {
        self.samples.iter().copied().max()
    }

    /// Smallest sample in the trace.
    #[must_use]
    pub fn min_sample(&self) -> Option<i16> {
        self.samples.iter().copied().min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_len_zero_filled() {
        let wf = Waveform::with_len(7, DEFAULT_TRACE_LENGTH);
        assert_eq!(wf.id(), 7);
        assert_eq!(wf.len(), 512);
        assert!(wf.samples().iter().all(|&s| s == 0));
        assert!(!wf.has_baseline());
    }

    #[test]
    fn test_add_charge() {
        let mut wf = Waveform::with_len(0, 4);
        wf.add_charge(2, 100).unwrap();
        wf.add_charge(2, 50).unwrap();
        assert_eq!(wf.samples(), &[0, 0, 150, 0]);
        assert!(wf.add_charge(4, 1).is_err());
    }

    #[test]
    fn test_add_charge_saturates() {
        let mut wf = Waveform::with_len(0, 1);
        wf.add_charge(0, i16::MAX).unwrap();
        wf.add_charge(0, 1).unwrap();
        assert_eq!(wf.samples()[0], i16::MAX);
    }

    #[test]
    fn test_window_clamped() {
        let mut wf = Waveform::with_len(0, 10);
        wf.set_window(2, 100).unwrap();
        assert_eq!(wf.analysis_range(), (2, 10));
        assert!(wf.set_window(5, 2).is_err());
        wf.clear_window();
        assert_eq!(wf.analysis_range(), (0, 10));
    }

    #[test]
    fn test_clear_derived_keeps_samples() {
        let mut wf = Waveform::from_samples(1, vec![1, 2, 3]);
        wf.set_baseline(2.0, 0.5);
        wf.set_over_threshold(vec![1, 2], 4.0);
        wf.clear_derived();
        assert!(!wf.has_baseline());
        assert!(wf.over_threshold().is_empty());
        assert_eq!(wf.samples(), &[1, 2, 3]);
    }
}
