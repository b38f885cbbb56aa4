//! FADC frame format: byte-aligned, big-endian, fixed 32-byte header.
//!
//! A frame is `header | payload | trailer`. Full-readout frames carry one
//! channel's complete trace as big-endian i16 samples; partial-readout
//! (zero-suppressed) frames carry u32 items packing channel, bin and
//! amplitude. The trailer is a big-endian u32 additive checksum over the
//! payload bytes.

use tracing::warn;

use crate::decoder::{DecoderConfig, FrameDecoder, FrameInfo, SampleSink};
use crate::error::{FrameError, Result};

/// Header length in bytes (one header unit).
pub const HEADER_LEN: usize = 32;
/// Trailer length in bytes.
pub const TRAILER_LEN: usize = 4;
/// The single supported format revision.
pub const SUPPORTED_REVISION: u8 = 0x03;
/// Frame type byte for partial (zero-suppressed) readout.
pub const FRAME_TYPE_PARTIAL: u8 = 0x01;
/// Frame type byte for full readout.
pub const FRAME_TYPE_FULL: u8 = 0x02;
/// Mandated item size for partial-readout frames.
pub const PARTIAL_ITEM_SIZE: u8 = 4;
/// Mandated item size for full-readout frames.
pub const FULL_ITEM_SIZE: u8 = 2;

/// Channels per board in the global channel-id scheme.
const CHANNELS_PER_BOARD: u32 = 64;

/// Decoded FADC header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadcHeader {
    /// Declared total frame size in bytes.
    pub frame_size: u32,
    /// Header size in units (one unit = 32 bytes).
    pub header_units: u8,
    /// Frame type byte.
    pub frame_type: u8,
    /// Format revision.
    pub revision: u8,
    /// Declared item size in bytes.
    pub item_size: u8,
    /// Declared item count.
    pub item_count: u16,
    /// Acquisition event index.
    pub event_index: u32,
    /// Front-end board index.
    pub board_index: u16,
    /// Read offset, must be zero.
    pub read_offset: u16,
    /// Status/error bits, must all be clear.
    pub status: u16,
    /// Trigger timestamp, whole seconds.
    pub timestamp_secs: u32,
    /// Trigger timestamp, sub-second part in nanoseconds.
    pub timestamp_nanos: u32,
    /// Channel number on the board (full readout only).
    pub channel: u8,
}

impl FadcHeader {
    /// Assembles the header fields from fixed big-endian byte offsets.
    ///
    /// # Errors
    /// Returns [`FrameError::Truncated`] if fewer than [`HEADER_LEN`] bytes
    /// are available. No structural checks are applied here; see
    /// [`FadcHeader::validate`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated {
                needed: HEADER_LEN,
                have: bytes.len(),
            });
        }
        Ok(Self {
            frame_size: be_u32(&bytes[0..4]),
            header_units: bytes[4],
            frame_type: bytes[5],
            revision: bytes[6],
            item_size: bytes[7],
            item_count: be_u16(&bytes[8..10]),
            event_index: be_u32(&bytes[10..14]),
            board_index: be_u16(&bytes[14..16]),
            read_offset: be_u16(&bytes[16..18]),
            status: be_u16(&bytes[18..20]),
            timestamp_secs: be_u32(&bytes[20..24]),
            timestamp_nanos: be_u32(&bytes[24..28]),
            channel: bytes[28],
        })
    }

    /// Runs every structural check against the configuration.
    ///
    /// The frame-size/item-count consistency check is soft under lenient
    /// strictness: a mismatch is logged and the declared item count is
    /// trusted over the size field.
    ///
    /// # Errors
    /// Returns the first failed check.
    pub fn validate(&self, config: &DecoderConfig) -> Result<()> {
        if self.revision != SUPPORTED_REVISION {
            return Err(FrameError::UnsupportedRevision(self.revision));
        }
        if self.header_units != 1 {
            return Err(FrameError::BadHeaderSize(self.header_units));
        }
        let expected_item_size = match self.frame_type {
            FRAME_TYPE_PARTIAL => PARTIAL_ITEM_SIZE,
            FRAME_TYPE_FULL => FULL_ITEM_SIZE,
            other => return Err(FrameError::UnknownFrameType(other)),
        };
        if self.item_size != expected_item_size {
            return Err(FrameError::ItemSizeMismatch {
                expected: expected_item_size,
                found: self.item_size,
            });
        }
        if self.frame_type == FRAME_TYPE_FULL {
            let expected = u16::try_from(config.trace_length).unwrap_or(u16::MAX);
            if self.item_count != expected {
                return Err(FrameError::ItemCountMismatch {
                    expected,
                    found: self.item_count,
                });
            }
        }
        if self.read_offset != 0 {
            return Err(FrameError::NonZeroReadOffset(self.read_offset));
        }
        if self.status != 0 {
            return Err(FrameError::StatusBitsSet(self.status));
        }

        let computed = u32::from(self.item_count) * u32::from(self.item_size)
            + HEADER_LEN as u32
            + TRAILER_LEN as u32;
        if self.frame_size != computed {
            if config.tolerates_soft_errors() {
                warn!(
                    declared = self.frame_size,
                    computed,
                    board = self.board_index,
                    "frame size mismatch, trusting item count"
                );
            } else {
                return Err(FrameError::FrameSizeMismatch {
                    declared: self.frame_size,
                    computed,
                });
            }
        }
        Ok(())
    }

    /// Payload length implied by the declared item count.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        usize::from(self.item_count) * usize::from(self.item_size)
    }

    /// Global channel id of the full-readout channel.
    #[must_use]
    pub fn channel_id(&self) -> u32 {
        u32::from(self.board_index) * CHANNELS_PER_BOARD + u32::from(self.channel)
    }
}

/// FADC decoder strategy.
#[derive(Debug, Clone, Default)]
pub struct FadcDecoder {
    config: DecoderConfig,
}

impl FadcDecoder {
    /// Creates a decoder with the given configuration.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

}

impl FrameDecoder for FadcDecoder {
    fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn header_len(&self) -> usize {
        HEADER_LEN
    }

    fn parse_header(&self, frame: &[u8]) -> Result<FrameInfo> {
        let header = FadcHeader::parse(frame)?;
        header.validate(&self.config)?;
        Ok(FrameInfo {
            event_index: u64::from(header.event_index),
            board: header.board_index,
            timestamp_secs: header.timestamp_secs,
            timestamp_nanos: header.timestamp_nanos,
        })
    }

    fn parse_data(&self, frame: &[u8], sink: &mut dyn SampleSink) -> Result<usize> {
        let header = FadcHeader::parse(frame)?;
        let payload_end = HEADER_LEN + header.payload_len();
        let payload = frame
            .get(HEADER_LEN..payload_end)
            .ok_or(FrameError::Truncated {
                needed: payload_end,
                have: frame.len(),
            })?;

        match header.frame_type {
            FRAME_TYPE_FULL => {
                let channel = header.channel_id();
                for item in payload.chunks_exact(usize::from(FULL_ITEM_SIZE)) {
                    sink.append_sample(channel, i16::from_be_bytes([item[0], item[1]]));
                }
                sink.finish_channel(channel);
            }
            FRAME_TYPE_PARTIAL => {
                let mut touched: Vec<u32> = Vec::new();
                for item in payload.chunks_exact(usize::from(PARTIAL_ITEM_SIZE)) {
                    let word = be_u32(item);
                    let channel = u32::from(header.board_index) * CHANNELS_PER_BOARD
                        + ((word >> 24) & 0xFF);
                    let bin = ((word >> 12) & 0xFFF) as usize;
                    let amplitude = (word & 0xFFF) as i16;
                    sink.add_charge(channel, bin, amplitude);
                    if !touched.contains(&channel) {
                        touched.push(channel);
                    }
                }
                for channel in touched {
                    sink.finish_channel(channel);
                }
            }
            other => return Err(FrameError::UnknownFrameType(other)),
        }

        Ok(payload_end)
    }

    fn parse_trailer(&self, frame: &[u8], data_end: usize) -> Result<usize> {
        let trailer = frame
            .get(data_end..data_end + TRAILER_LEN)
            .ok_or(FrameError::Truncated {
                needed: data_end + TRAILER_LEN,
                have: frame.len(),
            })?;
        let stored = be_u32(trailer);
        let computed = checksum(&frame[HEADER_LEN..data_end]);
        if stored != computed {
            if self.config.tolerates_soft_errors() {
                warn!(stored, computed, "trailer checksum mismatch");
            } else {
                return Err(FrameError::ChecksumMismatch { stored, computed });
            }
        }
        Ok(data_end + TRAILER_LEN)
    }
}

/// Additive payload checksum stored in the trailer.
#[must_use]
pub fn checksum(payload: &[u8]) -> u32 {
    payload
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(u32::from(b)))
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Strictness;

    fn valid_header_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        let frame_size = (HEADER_LEN + 512 * 2 + TRAILER_LEN) as u32;
        bytes[0..4].copy_from_slice(&frame_size.to_be_bytes());
        bytes[4] = 1; // header units
        bytes[5] = FRAME_TYPE_FULL;
        bytes[6] = SUPPORTED_REVISION;
        bytes[7] = FULL_ITEM_SIZE;
        bytes[8..10].copy_from_slice(&512u16.to_be_bytes());
        bytes[10..14].copy_from_slice(&7u32.to_be_bytes()); // event index
        bytes[14..16].copy_from_slice(&3u16.to_be_bytes()); // board
        bytes[20..24].copy_from_slice(&100u32.to_be_bytes()); // secs
        bytes[24..28].copy_from_slice(&250u32.to_be_bytes()); // nanos
        bytes[28] = 5; // channel
        bytes
    }

    #[test]
    fn test_valid_header_round_trip() {
        let header = FadcHeader::parse(&valid_header_bytes()).unwrap();
        assert!(header.validate(&DecoderConfig::default()).is_ok());
        assert_eq!(header.event_index, 7);
        assert_eq!(header.board_index, 3);
        assert_eq!(header.channel_id(), 3 * 64 + 5);
    }

    #[test]
    fn test_flipping_any_validated_field_invalidates() {
        let cases: Vec<(usize, u8)> = vec![
            (6, 0x04),  // revision
            (7, 3),     // item size
            (9, 0xFF),  // item count low byte
            (4, 2),     // header units
            (17, 1),    // read offset low byte
            (19, 0x10), // status low byte
        ];
        for (offset, value) in cases {
            let mut bytes = valid_header_bytes();
            bytes[offset] = value;
            let header = FadcHeader::parse(&bytes).unwrap();
            assert!(
                header.validate(&DecoderConfig::default()).is_err(),
                "byte {offset} flip should invalidate"
            );
        }
    }

    #[test]
    fn test_truncated_header() {
        let bytes = valid_header_bytes();
        assert!(matches!(
            FadcHeader::parse(&bytes[..HEADER_LEN - 1]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn test_size_mismatch_soft_vs_strict() {
        let mut bytes = valid_header_bytes();
        bytes[0..4].copy_from_slice(&9999u32.to_be_bytes());
        let header = FadcHeader::parse(&bytes).unwrap();

        assert!(header.validate(&DecoderConfig::default()).is_ok());

        let strict = DecoderConfig {
            strictness: Strictness::Strict,
            ..DecoderConfig::default()
        };
        assert!(matches!(
            header.validate(&strict),
            Err(FrameError::FrameSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF; 4]), 0x3FC);
    }
}
