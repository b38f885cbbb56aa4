//! Error types for wavedaq-formats.

use thiserror::Error;

use crate::packed::WordTag;

/// Result type alias for frame decoding.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Frame decode errors.
///
/// Every variant except [`FrameError::Truncated`] marks a structurally
/// invalid frame; the assembler decides between resynchronization and
/// retirement. `Truncated` at a frame boundary is ordinary end of stream.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Not enough bytes left for the structure being parsed.
    #[error("truncated frame: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    /// Declared revision is not the single supported value.
    #[error("unsupported revision {0:#04x}")]
    UnsupportedRevision(u8),

    /// Frame type byte is not a known readout mode.
    #[error("unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    /// Item size does not match the value mandated by the frame type.
    #[error("item size {found} does not match frame type (expected {expected})")]
    ItemSizeMismatch { expected: u8, found: u8 },

    /// Full-readout frame declares an unexpected item count.
    #[error("full-readout frame declares {found} items, expected {expected}")]
    ItemCountMismatch { expected: u16, found: u16 },

    /// Header size field differs from one unit.
    #[error("header size field {0} is not 1 unit")]
    BadHeaderSize(u8),

    /// Read offset field is non-zero.
    #[error("non-zero read offset {0}")]
    NonZeroReadOffset(u16),

    /// Status/error bits are set.
    #[error("status bits set: {0:#06x}")]
    StatusBitsSet(u16),

    /// Declared frame size disagrees with the item count and size.
    #[error("frame size {declared} does not match computed size {computed}")]
    FrameSizeMismatch { declared: u32, computed: u32 },

    /// Stored trailer checksum disagrees with the payload.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Word does not classify as any known tag.
    #[error("unclassifiable word {0:#010x}")]
    UnknownWord(u32),

    /// A correctly classified word appeared where another tag was required.
    #[error("unexpected {tag:?} word while {context}")]
    UnexpectedWord { tag: WordTag, context: &'static str },

    /// Channel-block trailer disagrees with the number of data words seen.
    #[error("trailer declares {declared} words, block has {counted}")]
    WordCountMismatch { declared: u32, counted: u32 },

    /// Final trailer reports non-zero status flags.
    #[error("final trailer status set: {0:#09x}")]
    TrailerStatusSet(u32),
}
