//! Error types for wavedaq-io.

use std::path::PathBuf;

use thiserror::Error;
use wavedaq_formats::FrameError;

/// Result type alias for source and assembler operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// I/O and assembly errors.
///
/// Only these stop the pipeline; recoverable mid-stream corruption is
/// absorbed by the per-source resynchronization path and surfaces in the
/// run summary instead.
#[derive(Error, Debug)]
pub enum IoError {
    /// Underlying file I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The very first frame of a source failed format validation; there is
    /// nothing to resynchronize against, so the whole run aborts.
    #[error("source {path}: first frame invalid: {source}")]
    Corrupt {
        /// Path of the offending source.
        path: PathBuf,
        /// The structural check that failed.
        source: FrameError,
    },
}
