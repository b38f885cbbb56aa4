//! Decoder strategy interface shared by all frame formats.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How forgiving a decoder is about soft inconsistencies.
///
/// Under [`Strictness::Lenient`] a frame-size/item-count mismatch or a bad
/// trailer checksum is logged and the declared item count is trusted; under
/// [`Strictness::Strict`] both invalidate the frame and the assembler's
/// normal resynchronization path takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Log soft inconsistencies and continue.
    #[default]
    Lenient,
    /// Treat soft inconsistencies as invalid frames.
    Strict,
}

/// Decoder configuration shared by all formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Soft-inconsistency policy.
    pub strictness: Strictness,
    /// Expected trace length for full-readout frames, in samples.
    pub trace_length: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            trace_length: 512,
        }
    }
}

impl DecoderConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the JSON is malformed
    /// or the trace length is zero.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the trace length is zero.
    pub fn from_json(json: &str) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.trace_length == 0 {
            return Err("trace_length must be non-zero".into());
        }
        Ok(())
    }

    /// Returns true when soft inconsistencies are tolerated.
    #[must_use]
    pub fn tolerates_soft_errors(&self) -> bool {
        self.strictness == Strictness::Lenient
    }
}

/// Structured fields shared by every format's frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Acquisition event index this frame belongs to.
    pub event_index: u64,
    /// Front-end board the frame came from.
    pub board: u16,
    /// Trigger timestamp, whole seconds.
    pub timestamp_secs: u32,
    /// Trigger timestamp, sub-second part in nanoseconds.
    pub timestamp_nanos: u32,
}

/// Receiver for decoded samples, keyed by channel id.
///
/// Implemented by the assembler's per-channel accumulation map; decoders
/// scatter payload samples through it without knowing how waveforms are
/// stored.
pub trait SampleSink {
    /// Appends one sample at the end of a channel's trace.
    fn append_sample(&mut self, channel: u32, value: i16);

    /// Adds charge into an existing bin of a channel's trace.
    fn add_charge(&mut self, channel: u32, bin: usize, value: i16);

    /// Marks a channel's trace complete for the current event.
    fn finish_channel(&mut self, channel: u32);
}

/// A per-format frame decoding strategy.
///
/// `frame` slices always start at the first byte of the frame header. The
/// three capabilities are called in order by the assembler:
/// `parse_header`, then `parse_data` (which scatters samples into the
/// sink and returns the offset just past the payload), then
/// `parse_trailer` (which returns the total frame length).
///
/// A failed `parse_header` must leave the sink and all decoder state
/// untouched; the caller owns resynchronization.
pub trait FrameDecoder {
    /// The active decoder configuration.
    ///
    /// Callers sizing waveforms for sparse-readout channels must use the
    /// trace length from here so it cannot diverge from header validation.
    fn config(&self) -> &DecoderConfig;

    /// Fixed header length in bytes, also the resynchronization step.
    fn header_len(&self) -> usize;

    /// Parses and validates a frame header.
    ///
    /// # Errors
    /// Returns a [`crate::FrameError`] describing the first failed
    /// structural check.
    fn parse_header(&self, frame: &[u8]) -> Result<FrameInfo>;

    /// Decodes the payload, scattering samples into `sink`.
    ///
    /// Returns the offset of the first byte past the payload.
    ///
    /// # Errors
    /// Returns a [`crate::FrameError`] on malformed payload structure.
    fn parse_data(&self, frame: &[u8], sink: &mut dyn SampleSink) -> Result<usize>;

    /// Checks the trailer at `data_end` and returns the full frame length.
    ///
    /// # Errors
    /// Returns a [`crate::FrameError`] on a hard trailer failure; soft
    /// checksum mismatches follow the configured strictness.
    fn parse_trailer(&self, frame: &[u8], data_end: usize) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.strictness, Strictness::Lenient);
        assert_eq!(config.trace_length, 512);
        assert!(config.tolerates_soft_errors());
    }

    #[test]
    fn test_config_from_json() {
        let config =
            DecoderConfig::from_json(r#"{ "strictness": "strict", "trace_length": 1024 }"#)
                .unwrap();
        assert_eq!(config.strictness, Strictness::Strict);
        assert_eq!(config.trace_length, 1024);
        assert!(!config.tolerates_soft_errors());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config = DecoderConfig::from_json(r#"{ "strictness": "strict" }"#).unwrap();
        assert_eq!(config.trace_length, 512);
    }

    #[test]
    fn test_config_rejects_zero_trace_length() {
        assert!(DecoderConfig::from_json(r#"{ "trace_length": 0 }"#).is_err());
    }
}
