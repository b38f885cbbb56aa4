//! wavedaq-io: Memory-mapped sources and the multi-source event assembler.
//!
//! One or more binary files per decoder instance are multiplexed
//! cooperatively: the assembler always serves the lowest pending event
//! identifier across all open sources, which yields a total order on
//! emitted events. Everything runs pull-based on the calling thread.

pub mod assembler;
pub mod error;
pub mod source;

pub use assembler::{EventAssembler, RunSummary, SourceReport};
pub use error::{IoError, Result};
pub use source::{Source, SourceState};
