//! A single memory-mapped input and its per-source decode state machine.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};

use wavedaq_formats::{FrameDecoder, FrameError, FrameInfo, SampleSink};

use crate::error::{IoError, Result};

/// Event index reported by retired sources, excluding them from the
/// minimum-pending computation.
pub const RETIRED_EVENT_INDEX: u64 = u64::MAX;

/// Bounded forward scan length for resynchronization, in header-sized
/// windows.
pub const RESYNC_WINDOWS: usize = 64;

/// Per-source decode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// The next frame header has not been parsed yet.
    HeaderPending,
    /// A structurally valid header is pending consumption.
    HeaderValid,
    /// The pending frame's payload and trailer have been consumed.
    DataConsumed,
    /// End of stream or unrecoverable corruption; permanent.
    Retired,
}

/// One open binary input, owned exclusively by the assembler.
pub struct Source {
    mmap: Mmap,
    path: PathBuf,
    offset: usize,
    state: SourceState,
    pending: Option<FrameInfo>,
    resync_count: u32,
}

impl Source {
    /// Opens and memory-maps a source file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not
        // modified concurrently. This is the standard safety contract for
        // memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
            offset: 0,
            state: SourceState::HeaderPending,
            pending: None,
            resync_count: 0,
        })
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current decode state.
    #[must_use]
    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Number of successful resynchronizations on this source.
    #[must_use]
    pub fn resync_count(&self) -> u32 {
        self.resync_count
    }

    /// Event index of the pending header, or [`RETIRED_EVENT_INDEX`] when
    /// no valid header is pending.
    #[must_use]
    pub fn pending_event(&self) -> u64 {
        match (self.state, &self.pending) {
            (SourceState::HeaderValid, Some(info)) => info.event_index,
            _ => RETIRED_EVENT_INDEX,
        }
    }

    /// The pending header fields, if a valid header is waiting.
    #[must_use]
    pub fn pending_info(&self) -> Option<&FrameInfo> {
        if self.state == SourceState::HeaderValid {
            self.pending.as_ref()
        } else {
            None
        }
    }

    fn remaining(&self) -> &[u8] {
        &self.mmap[self.offset.min(self.mmap.len())..]
    }

    fn retire(&mut self, reason: &str) {
        debug!(path = %self.path.display(), reason, "source retired");
        self.state = SourceState::Retired;
        self.pending = None;
    }

    /// Parses the next frame header, transitioning to `HeaderValid`,
    /// `Retired`, or resynchronizing on mid-stream corruption.
    ///
    /// # Errors
    /// Returns [`IoError::Corrupt`] only when the very first frame of the
    /// source fails a structural check; that aborts the whole run.
    pub fn advance_header(&mut self, decoder: &dyn FrameDecoder) -> Result<()> {
        if self.state == SourceState::Retired || self.state == SourceState::HeaderValid {
            return Ok(());
        }

        let remaining = self.remaining();
        if remaining.is_empty() {
            self.retire("end of stream");
            return Ok(());
        }

        match decoder.parse_header(remaining) {
            Ok(info) => {
                self.pending = Some(info);
                self.state = SourceState::HeaderValid;
                Ok(())
            }
            Err(FrameError::Truncated { .. }) if self.offset > 0 => {
                // Trailing bytes smaller than a header
                self.retire("truncated tail");
                Ok(())
            }
            Err(err) if self.offset == 0 => Err(IoError::Corrupt {
                path: self.path.clone(),
                source: err,
            }),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    offset = self.offset,
                    error = %err,
                    "invalid header, resynchronizing"
                );
                self.resynchronize(decoder);
                Ok(())
            }
        }
    }

    /// Bounded forward scan for the next structurally valid header.
    ///
    /// Steps through up to [`RESYNC_WINDOWS`] header-sized windows; on
    /// success the per-source error counter is incremented, otherwise the
    /// source is retired.
    pub fn resynchronize(&mut self, decoder: &dyn FrameDecoder) {
        let step = decoder.header_len();
        for _ in 0..RESYNC_WINDOWS {
            self.offset += step;
            let remaining = self.remaining();
            if remaining.is_empty() {
                self.retire("end of stream during resynchronization");
                return;
            }
            match decoder.parse_header(remaining) {
                Ok(info) => {
                    self.resync_count += 1;
                    self.pending = Some(info);
                    self.state = SourceState::HeaderValid;
                    return;
                }
                Err(FrameError::Truncated { .. }) => {
                    self.retire("truncated tail during resynchronization");
                    return;
                }
                Err(_) => {}
            }
        }
        self.retire("resynchronization scan exhausted");
    }

    /// Consumes the pending frame's payload and trailer, scattering samples
    /// into `sink`, then immediately tries to parse the next header.
    ///
    /// # Errors
    /// Returns the frame error on malformed payload or trailer; the caller
    /// routes it into resynchronization. `IoError::Corrupt` cannot occur
    /// here because a valid header was already consumed from this source.
    pub fn consume(
        &mut self,
        decoder: &dyn FrameDecoder,
        sink: &mut dyn SampleSink,
    ) -> std::result::Result<(), FrameError> {
        debug_assert_eq!(self.state, SourceState::HeaderValid);
        let frame = &self.mmap[self.offset..];
        let result = decoder
            .parse_data(frame, sink)
            .and_then(|data_end| decoder.parse_trailer(frame, data_end));
        match result {
            Ok(frame_len) => {
                self.offset += frame_len;
                self.state = SourceState::DataConsumed;
                self.pending = None;
                Ok(())
            }
            Err(err) => {
                self.pending = None;
                self.state = SourceState::HeaderPending;
                Err(err)
            }
        }
    }
}
