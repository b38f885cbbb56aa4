//! wavedaq-formats: Vendor frame formats behind one decoder interface.
//!
//! Each front-end electronics format gets a small strategy object
//! implementing [`FrameDecoder`]; the generic event assembler in
//! `wavedaq-io` drives any of them. Two representative formats are
//! provided:
//!
//! - [`FadcDecoder`] - byte-aligned big-endian frames with a fixed 32-byte
//!   header, full- or partial-readout payloads and a checksum trailer
//! - [`PackedDecoder`] - little-endian 32-bit word stream classified by the
//!   top bits of each word
//!
//! Structural validation failures never drive data extraction; the caller
//! owns resynchronization.

pub mod decoder;
pub mod error;
pub mod fadc;
pub mod packed;

pub use decoder::{DecoderConfig, FrameDecoder, FrameInfo, SampleSink, Strictness};
pub use error::{FrameError, Result};
pub use fadc::{FadcDecoder, FadcHeader};
pub use packed::{classify, PackedDecoder, WordTag};
