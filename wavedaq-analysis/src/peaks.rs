//! Smoothed local-maximum peak location.

use wavedaq_core::Waveform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smoothing half-window for standard readout channels.
const HALF_WINDOW: usize = 5;
/// Neighbors within the window allowed to match or exceed a candidate.
const PLATEAU_TOLERANCE: usize = 2;
/// Smoothing half-window for the narrow veto variant.
const VETO_HALF_WINDOW: usize = 2;

/// A located peak.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    /// Sample index of the peak.
    pub position: usize,
    /// Three-point average of raw samples centered on the position.
    pub raw_amplitude: f64,
    /// Raw amplitude minus the cached baseline level.
    pub corrected_amplitude: f64,
}

/// Peak locator parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakConfig {
    /// Minimum baseline-corrected smoothed value for an accepted peak.
    pub amplitude_threshold: f64,
    /// Minimum distance between reported peak positions, in samples.
    pub min_separation: usize,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: 10.0,
            min_separation: 20,
        }
    }
}

impl PeakConfig {
    /// Sets the acceptance threshold on the corrected smoothed value.
    #[must_use]
    pub fn with_amplitude_threshold(mut self, threshold: f64) -> Self {
        self.amplitude_threshold = threshold;
        self
    }

    /// Sets the minimum separation between reported peaks.
    #[must_use]
    pub fn with_min_separation(mut self, separation: usize) -> Self {
        self.min_separation = separation;
        self
    }
}

/// Locates peaks in the waveform's analysis range.
///
/// A centered rolling average with a fixed half-window smooths the trace
/// (the window narrows at the range edges). A sample is a candidate if at
/// most a small fixed count of its windowed neighbors have a smoothed value
/// at or above its own, which tolerates plateaus without requiring a strict
/// single maximum. An accepted peak's reported position is the smoothed
/// argmax within the next `min_separation` samples, correcting the
/// left-shift bias on plateaus; its amplitude is the 3-point average of raw
/// samples centered there. Reported peaks are never closer than
/// `min_separation`.
#[must_use]
pub fn find_peaks(waveform: &Waveform, config: &PeakConfig) -> Vec<Peak> {
    locate(waveform, config, HALF_WINDOW, PLATEAU_TOLERANCE)
}

/// Narrow-window variant for veto-style channels.
///
/// Same algorithm with a smaller smoothing window and a strict plateau test
/// (any neighbor at or above the candidate rejects it), trading sensitivity
/// for temporal precision.
#[must_use]
pub fn find_veto_peaks(waveform: &Waveform, config: &PeakConfig) -> Vec<Peak> {
    locate(waveform, config, VETO_HALF_WINDOW, 0)
}

fn locate(
    waveform: &Waveform,
    config: &PeakConfig,
    half_window: usize,
    plateau_tolerance: usize,
) -> Vec<Peak> {
    let (start, end) = waveform.analysis_range();
    if end <= start {
        return Vec::new();
    }

    let samples = waveform.samples();
    let baseline = waveform.baseline();

    // Centered rolling average; the window narrows near the edges instead
    // of wrapping or zero-padding.
    let smoothed: Vec<f64> = (start..end)
        .map(|i| {
            let lo = i.saturating_sub(half_window).max(start);
            let hi = (i + half_window + 1).min(end);
            samples[lo..hi].iter().map(|&s| f64::from(s)).sum::<f64>() / (hi - lo) as f64
        })
        .collect();

    let mut peaks: Vec<Peak> = Vec::new();
    let mut last_position: Option<usize> = None;

    for i in start..end {
        if let Some(last) = last_position {
            if i < last + config.min_separation.max(1) {
                continue;
            }
        }
        let s = smoothed[i - start];
        if s - baseline <= config.amplitude_threshold {
            continue;
        }

        let lo = i.saturating_sub(half_window).max(start);
        let hi = (i + half_window + 1).min(end);
        let rivals = (lo..hi)
            .filter(|&j| j != i && smoothed[j - start] >= s)
            .count();
        if rivals > plateau_tolerance {
            continue;
        }

        // True position: smoothed argmax within the next min_separation
        // samples.
        let search_end = (i + config.min_separation.max(1)).min(end);
        let position = (i..search_end)
            .max_by(|&a, &b| smoothed[a - start].total_cmp(&smoothed[b - start]))
            .unwrap_or(i);

        let amp_lo = position.saturating_sub(1).max(start);
        let amp_hi = (position + 2).min(end);
        let raw_amplitude = samples[amp_lo..amp_hi]
            .iter()
            .map(|&s| f64::from(s))
            .sum::<f64>()
            / (amp_hi - amp_lo) as f64;

        peaks.push(Peak {
            position,
            raw_amplitude,
            corrected_amplitude: raw_amplitude - baseline,
        });
        last_position = Some(position);
    }

    peaks
}
