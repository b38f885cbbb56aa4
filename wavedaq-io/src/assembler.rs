//! Multi-source event assembly.
//!
//! The assembler owns one [`Source`] per input file and a single
//! [`FrameDecoder`]. Each call to [`EventAssembler::next_event`] picks the
//! lowest pending event index across all live sources and drains every
//! frame carrying that index, so events come out in ascending id order
//! even when the inputs interleave arbitrarily.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use wavedaq_core::{Event, Waveform};
use wavedaq_formats::{FrameDecoder, SampleSink};

use crate::error::Result;
use crate::source::{Source, SourceState, RETIRED_EVENT_INDEX};

/// Per-source statistics for the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    /// Path of the source file.
    pub path: PathBuf,
    /// Successful mid-stream resynchronizations.
    pub resyncs: u32,
    /// Whether the source has been retired.
    pub retired: bool,
}

/// Aggregate statistics over a whole assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// One report per source, in registration order.
    pub sources: Vec<SourceReport>,
    /// Frames dropped after a payload or trailer failure.
    pub rejected_frames: u64,
    /// Events emitted with the validity flag cleared.
    pub invalid_events: u64,
}

struct ChannelAccumulator {
    waveform: Waveform,
    finished: bool,
}

/// Collects decoded samples for one event, keyed by channel id.
///
/// Full-readout channels grow by appending; sparse channels are created at
/// the configured trace length so charge can land in any bin.
struct EventAccumulator {
    trace_length: usize,
    channels: Vec<ChannelAccumulator>,
    index: HashMap<u32, usize>,
}

impl EventAccumulator {
    fn new(trace_length: usize) -> Self {
        Self {
            trace_length,
            channels: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn slot(&mut self, channel: u32, sparse: bool) -> &mut ChannelAccumulator {
        let trace_length = self.trace_length;
        let idx = *self.index.entry(channel).or_insert_with(|| {
            let waveform = if sparse {
                Waveform::with_len(channel, trace_length)
            } else {
                Waveform::new(channel)
            };
            self.channels.push(ChannelAccumulator {
                waveform,
                finished: false,
            });
            self.channels.len() - 1
        });
        &mut self.channels[idx]
    }
}

impl SampleSink for EventAccumulator {
    fn append_sample(&mut self, channel: u32, value: i16) {
        let slot = self.slot(channel, false);
        if slot.finished {
            warn!(channel, "sample for finished channel dropped");
            return;
        }
        slot.waveform.push_sample(value);
    }

    fn add_charge(&mut self, channel: u32, bin: usize, value: i16) {
        let slot = self.slot(channel, true);
        if slot.finished {
            warn!(channel, "charge for finished channel dropped");
            return;
        }
        if slot.waveform.add_charge(bin, value).is_err() {
            warn!(channel, bin, "charge bin out of range, dropped");
        }
    }

    fn finish_channel(&mut self, channel: u32) {
        self.slot(channel, false).finished = true;
    }
}

/// Swallows samples from frames that arrive too late to assemble.
struct DiscardSink;

impl SampleSink for DiscardSink {
    fn append_sample(&mut self, _channel: u32, _value: i16) {}
    fn add_charge(&mut self, _channel: u32, _bin: usize, _value: i16) {}
    fn finish_channel(&mut self, _channel: u32) {}
}

/// Pull-based event builder over a set of memory-mapped sources.
pub struct EventAssembler<D: FrameDecoder> {
    decoder: D,
    sources: Vec<Source>,
    last_emitted: Option<u64>,
    rejected_frames: u64,
    invalid_events: u64,
}

impl<D: FrameDecoder> EventAssembler<D> {
    /// Creates an assembler with no sources.
    ///
    /// Waveforms for sparse-readout channels are sized from the decoder's
    /// configured trace length.
    #[must_use]
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            sources: Vec::new(),
            last_emitted: None,
            rejected_frames: 0,
            invalid_events: 0,
        }
    }

    /// Creates an assembler over a set of source files.
    ///
    /// # Errors
    /// Returns an error if any file cannot be opened or memory-mapped.
    pub fn open<P, I>(decoder: D, paths: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        let mut assembler = Self::new(decoder);
        for path in paths {
            assembler.add_source(path)?;
        }
        Ok(assembler)
    }

    /// Opens and registers one more source file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn add_source<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let source = Source::open(path)?;
        info!(path = %source.path().display(), "source registered");
        self.sources.push(source);
        Ok(())
    }

    /// Number of registered sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Assembles and returns the next event in ascending event-id order,
    /// or `None` once every source is exhausted.
    ///
    /// A payload or trailer failure mid-event drops that frame, marks the
    /// event invalid and resynchronizes the offending source; only a
    /// corrupt first frame aborts the run. A resynchronized source whose
    /// next frame carries an event index at or below the last emitted id
    /// has its stale frames dropped, keeping emitted ids non-decreasing.
    ///
    /// # Errors
    /// Returns [`crate::IoError::Corrupt`] when the very first frame of a
    /// source fails validation.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        for source in &mut self.sources {
            source.advance_header(&self.decoder)?;
        }
        self.drop_stale_frames()?;

        let current = self
            .sources
            .iter()
            .map(Source::pending_event)
            .min()
            .unwrap_or(RETIRED_EVENT_INDEX);
        if current == RETIRED_EVENT_INDEX {
            return Ok(None);
        }

        let mut acc = EventAccumulator::new(self.decoder.config().trace_length);
        let mut timestamp: Option<(u32, u32)> = None;
        let mut ok = true;

        while let Some(idx) = self
            .sources
            .iter()
            .position(|s| s.pending_event() == current)
        {
            let Some(info) = self.sources[idx].pending_info().copied() else {
                break;
            };
            match self.sources[idx].consume(&self.decoder, &mut acc) {
                Ok(()) => match timestamp {
                    None => timestamp = Some((info.timestamp_secs, info.timestamp_nanos)),
                    Some((secs, nanos))
                        if secs != info.timestamp_secs || nanos != info.timestamp_nanos =>
                    {
                        warn!(event = current, "trigger timestamp disagrees between frames");
                    }
                    Some(_) => {}
                },
                Err(err) => {
                    warn!(
                        path = %self.sources[idx].path().display(),
                        event = current,
                        error = %err,
                        "frame rejected"
                    );
                    self.rejected_frames += 1;
                    ok = false;
                    self.sources[idx].resynchronize(&self.decoder);
                }
            }
            self.sources[idx].advance_header(&self.decoder)?;
        }

        let (secs, nanos) = timestamp.unwrap_or((0, 0));
        let mut event = Event::new(current, secs, nanos);
        for slot in acc.channels {
            if !slot.finished {
                warn!(
                    event = current,
                    channel = slot.waveform.id(),
                    "channel left unfinished"
                );
                ok = false;
            }
            if !event.add_waveform(slot.waveform) {
                ok = false;
            }
        }
        if !ok {
            self.invalid_events += 1;
        }
        event.set_ok(ok);
        self.last_emitted = Some(current);
        Ok(Some(event))
    }

    /// Drops pending frames whose event index is at or below the last
    /// emitted id.
    ///
    /// Resynchronization can land on an older frame; consuming it would
    /// regress the current event identifier, so the frame is skipped and
    /// counted as rejected instead.
    fn drop_stale_frames(&mut self) -> Result<()> {
        let Some(last) = self.last_emitted else {
            return Ok(());
        };
        for idx in 0..self.sources.len() {
            while let Some(info) = self.sources[idx].pending_info().copied() {
                if info.event_index > last {
                    break;
                }
                warn!(
                    path = %self.sources[idx].path().display(),
                    event = info.event_index,
                    last_emitted = last,
                    "stale frame dropped"
                );
                self.rejected_frames += 1;
                let mut discard = DiscardSink;
                if self.sources[idx].consume(&self.decoder, &mut discard).is_err() {
                    self.sources[idx].resynchronize(&self.decoder);
                }
                self.sources[idx].advance_header(&self.decoder)?;
            }
        }
        Ok(())
    }

    /// Snapshot of per-source and aggregate statistics.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            sources: self
                .sources
                .iter()
                .map(|s| SourceReport {
                    path: s.path().to_path_buf(),
                    resyncs: s.resync_count(),
                    retired: s.state() == SourceState::Retired,
                })
                .collect(),
            rejected_frames: self.rejected_frames,
            invalid_events: self.invalid_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_append_then_finish() {
        let mut acc = EventAccumulator::new(8);
        acc.append_sample(3, 10);
        acc.append_sample(3, -4);
        acc.finish_channel(3);
        assert_eq!(acc.channels.len(), 1);
        assert!(acc.channels[0].finished);
        assert_eq!(acc.channels[0].waveform.samples(), &[10, -4]);
    }

    #[test]
    fn test_accumulator_sparse_channel_is_presized() {
        let mut acc = EventAccumulator::new(8);
        acc.add_charge(1, 5, 100);
        acc.add_charge(1, 5, 50);
        assert_eq!(acc.channels[0].waveform.len(), 8);
        assert_eq!(acc.channels[0].waveform.samples()[5], 150);
    }

    #[test]
    fn test_accumulator_ignores_duplicate_contribution() {
        let mut acc = EventAccumulator::new(8);
        acc.append_sample(2, 1);
        acc.finish_channel(2);
        acc.append_sample(2, 99);
        assert_eq!(acc.channels[0].waveform.samples(), &[1]);
    }

    #[test]
    fn test_accumulator_drops_out_of_range_bin() {
        let mut acc = EventAccumulator::new(4);
        acc.add_charge(0, 9, 1);
        assert_eq!(acc.channels[0].waveform.samples(), &[0, 0, 0, 0]);
    }
}
