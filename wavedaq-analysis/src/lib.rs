//! wavedaq-analysis: Waveform statistics and pulse extraction.
//!
//! This crate provides the numeric algorithms consumed by every downstream
//! user of decoded waveforms:
//!
//! - **Baseline** - level/fluctuation estimation under three policies
//! - **Segmenter** - over-threshold run finding with significance filtering
//! - **Peaks** - smoothed local-maximum location, standard and veto variants
//! - **Shape** - rise-time extraction on located pulses
//!
//! All algorithms are pure functions of waveform state; the only side effect
//! is writing the waveform's cached derived fields.
#![warn(missing_docs)]

mod baseline;
mod peaks;
mod processing;
mod segment;
mod shape;

pub use baseline::{compute_baseline, measure_baseline, BaselinePolicy, IQR_TO_SIGMA};
pub use peaks::{find_peaks, find_veto_peaks, Peak, PeakConfig};
pub use processing::{analyze_event, AnalysisParams, ChannelSummary};
pub use segment::{segment, SegmenterParams};
pub use shape::{rise_time, RiseTimeConfig};
