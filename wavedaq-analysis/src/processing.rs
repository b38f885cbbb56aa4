//! One-call analysis pass over a completed event.

use rayon::prelude::*;

use wavedaq_core::{ChannelKind, ChannelOracle, Event, Waveform};

use crate::baseline::{measure_baseline, BaselinePolicy};
use crate::peaks::{find_peaks, find_veto_peaks, Peak, PeakConfig};
use crate::segment::{segment, SegmenterParams};
use crate::shape::{rise_time, RiseTimeConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for a full per-event analysis pass.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisParams {
    /// Baseline estimation policy.
    pub baseline_policy: BaselinePolicy,
    /// Baseline sample range `[start, end)`.
    pub baseline_range: (usize, usize),
    /// Threshold segmenter parameters.
    pub segmenter: SegmenterParams,
    /// Peak locator parameters.
    pub peaks: PeakConfig,
    /// Rise-time fractions.
    pub rise_time: RiseTimeConfig,
}

/// Derived observables for one channel.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelSummary {
    /// Channel id.
    pub channel: u32,
    /// Readout kind resolved through the channel oracle.
    pub kind: ChannelKind,
    /// Measured baseline level.
    pub baseline: f64,
    /// Measured baseline fluctuation.
    pub baseline_rms: f64,
    /// Threshold integral over the accepted runs.
    pub threshold_integral: f64,
    /// Located peaks, veto variant for veto channels.
    pub peaks: Vec<Peak>,
    /// Rise time of the first located peak, if measurable.
    pub rise_time: Option<f64>,
}

/// Runs baseline, segmentation, peak location and rise-time extraction on
/// every waveform of an event.
///
/// Channels are processed in parallel; the decode pipeline that produced
/// the event stays single-threaded. Waveform caches are updated in place
/// and the per-channel observables are returned in channel-id order.
pub fn analyze_event<O>(event: &mut Event, oracle: &O, params: &AnalysisParams) -> Vec<ChannelSummary>
where
    O: ChannelOracle + Sync,
{
    let waveforms: Vec<&mut Waveform> = event.waveforms_mut().collect();
    waveforms
        .into_par_iter()
        .map(|waveform| analyze_channel(waveform, oracle, params))
        .collect()
}

fn analyze_channel<O>(waveform: &mut Waveform, oracle: &O, params: &AnalysisParams) -> ChannelSummary
where
    O: ChannelOracle + Sync,
{
    let (start, end) = params.baseline_range;
    let (baseline, baseline_rms) =
        measure_baseline(waveform, start, end, params.baseline_policy);
    segment(waveform, &params.segmenter);

    let kind = oracle.lookup(waveform.id()).kind;
    let peaks = match kind {
        ChannelKind::Veto => find_veto_peaks(waveform, &params.peaks),
        _ => find_peaks(waveform, &params.peaks),
    };
    let first_rise = peaks
        .first()
        .and_then(|peak| rise_time(waveform, peak, &params.rise_time));

    ChannelSummary {
        channel: waveform.id(),
        kind,
        baseline,
        baseline_rms,
        threshold_integral: waveform.threshold_integral(),
        peaks,
        rise_time: first_rise,
    }
}
