//! Pulse-shape metrics on located peaks.

use wavedaq_core::Waveform;

use crate::peaks::Peak;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fractional levels for the rise-time measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiseTimeConfig {
    /// Lower fraction of the corrected amplitude.
    pub low_fraction: f64,
    /// Upper fraction of the corrected amplitude.
    pub high_fraction: f64,
}

impl Default for RiseTimeConfig {
    fn default() -> Self {
        Self {
            low_fraction: 0.1,
            high_fraction: 0.9,
        }
    }
}

/// Rise time of a located peak, in sample units.
///
/// Walks the leading edge back from the peak position and linearly
/// interpolates the crossing times of the low and high fractions of the
/// baseline-corrected amplitude. Returns `None` when the edge never drops
/// through both fractions inside the analysis range (for example a pulse
/// riding on the range boundary).
#[must_use]
pub fn rise_time(waveform: &Waveform, peak: &Peak, config: &RiseTimeConfig) -> Option<f64> {
    let (start, _) = waveform.analysis_range();
    if peak.position >= waveform.len() || peak.corrected_amplitude <= 0.0 {
        return None;
    }

    let high = config.high_fraction * peak.corrected_amplitude;
    let low = config.low_fraction * peak.corrected_amplitude;

    let t_high = crossing_before(waveform, peak.position, start, high)?;
    let t_low = crossing_before(waveform, t_high.floor() as usize, start, low)?;
    Some(t_high - t_low)
}

/// Interpolated time at which the corrected edge last crossed `target`
/// before `from`, searching down to `start`.
fn crossing_before(waveform: &Waveform, from: usize, start: usize, target: f64) -> Option<f64> {
    let mut i = from;
    while i > start {
        let below = waveform.corrected(i - 1);
        let above = waveform.corrected(i);
        if below < target && above >= target {
            let frac = if above > below {
                (target - below) / (above - below)
            } else {
                0.0
            };
            return Some((i - 1) as f64 + frac);
        }
        i -= 1;
    }
    None
}
