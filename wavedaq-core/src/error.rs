//! Error types for wavedaq-core.

use thiserror::Error;

/// Result type alias for wavedaq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for wavedaq operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Sample bin index outside the waveform's sample sequence.
    #[error("bin {bin} out of range for waveform of length {len}")]
    BinOutOfRange { bin: usize, len: usize },

    /// Analysis window with start after end.
    #[error("invalid analysis window [{start}, {end})")]
    InvalidWindow { start: usize, end: usize },
}
