//! Packed word-stream format: little-endian u32 words classified by their
//! top bits.
//!
//! A frame is `Header | secs | nanos | (ChannelId (Data|DataZs)* Trailer)*
//! FinalTrailer`. The two timestamp words after the header are raw u32
//! values and are not classified. Every other word carries a tag in its top
//! two or four bits; [`classify`] turns the masked comparison into a tagged
//! enum and one extraction function per variant pulls the fields out, so no
//! inline bit tests leak into control flow.

use tracing::warn;

use crate::decoder::{DecoderConfig, FrameDecoder, FrameInfo, SampleSink};
use crate::error::{FrameError, Result};

/// Header block length: header word plus two raw timestamp words.
pub const HEADER_LEN: usize = 12;
/// Word size in bytes.
pub const WORD_SIZE: usize = 4;
/// Offset-binary zero level of a 14-bit sample.
const SAMPLE_OFFSET: i32 = 8192;
/// Channels per board in the global channel-id scheme.
const CHANNELS_PER_BOARD: u32 = 4096;

/// Classification of one packed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordTag {
    /// Frame header carrying board and event index.
    Header,
    /// Two full-readout samples.
    Data,
    /// One zero-suppressed bin/amplitude pair.
    DataZs,
    /// Start of a channel block.
    ChannelId,
    /// End of a channel block.
    Trailer,
    /// End of the frame.
    FinalTrailer,
}

/// Classifies a word by its top bits.
///
/// # Errors
/// Returns [`FrameError::UnknownWord`] for the reserved tag space.
pub fn classify(word: u32) -> Result<WordTag> {
    match word >> 30 {
        0b00 => Ok(WordTag::Data),
        0b01 => Ok(WordTag::DataZs),
        0b10 => match word >> 28 {
            0x8 => Ok(WordTag::Header),
            0x9 => Ok(WordTag::ChannelId),
            0xA => Ok(WordTag::Trailer),
            0xB => Ok(WordTag::FinalTrailer),
            _ => unreachable!(),
        },
        _ => Err(FrameError::UnknownWord(word)),
    }
}

/// Board and event index of a `Header` word.
#[must_use]
pub fn header_fields(word: u32) -> (u8, u32) {
    (((word >> 20) & 0xFF) as u8, word & 0x000F_FFFF)
}

/// Channel number and declared sample count of a `ChannelId` word.
#[must_use]
pub fn channel_fields(word: u32) -> (u16, u16) {
    (((word >> 16) & 0xFFF) as u16, (word & 0xFFFF) as u16)
}

/// The two offset-binary samples of a `Data` word.
#[must_use]
pub fn data_samples(word: u32) -> (i16, i16) {
    let a = ((word >> 14) & 0x3FFF) as i32 - SAMPLE_OFFSET;
    let b = (word & 0x3FFF) as i32 - SAMPLE_OFFSET;
    (a as i16, b as i16)
}

/// Bin index and offset-binary amplitude of a `DataZs` word.
#[must_use]
pub fn zs_fields(word: u32) -> (usize, i16) {
    let bin = ((word >> 18) & 0xFFF) as usize;
    let amplitude = ((word >> 4) & 0x3FFF) as i32 - SAMPLE_OFFSET;
    (bin, amplitude as i16)
}

/// Declared data-word count of a channel-block `Trailer` word.
#[must_use]
pub fn trailer_word_count(word: u32) -> u32 {
    word & 0x0FFF_FFFF
}

/// Status flags of a `FinalTrailer` word.
#[must_use]
pub fn final_trailer_status(word: u32) -> u32 {
    word & 0x0FFF_FFFF
}

/// Packed word-stream decoder strategy.
#[derive(Debug, Clone, Default)]
pub struct PackedDecoder {
    config: DecoderConfig,
}

impl PackedDecoder {
    /// Creates a decoder with the given configuration.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

}

fn word_at(frame: &[u8], offset: usize) -> Result<u32> {
    frame
        .get(offset..offset + WORD_SIZE)
        .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .ok_or(FrameError::Truncated {
            needed: offset + WORD_SIZE,
            have: frame.len(),
        })
}

impl FrameDecoder for PackedDecoder {
    fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn header_len(&self) -> usize {
        HEADER_LEN
    }

    fn parse_header(&self, frame: &[u8]) -> Result<FrameInfo> {
        let word = word_at(frame, 0)?;
        match classify(word)? {
            WordTag::Header => {}
            tag => {
                return Err(FrameError::UnexpectedWord {
                    tag,
                    context: "expecting frame header",
                })
            }
        }
        let (board, event_index) = header_fields(word);
        let timestamp_secs = word_at(frame, WORD_SIZE)?;
        let timestamp_nanos = word_at(frame, 2 * WORD_SIZE)?;
        Ok(FrameInfo {
            event_index: u64::from(event_index),
            board: u16::from(board),
            timestamp_secs,
            timestamp_nanos,
        })
    }

    fn parse_data(&self, frame: &[u8], sink: &mut dyn SampleSink) -> Result<usize> {
        let header_word = word_at(frame, 0)?;
        let (board, _) = header_fields(header_word);

        let mut offset = HEADER_LEN;
        let mut channel: Option<u32> = None;
        let mut declared_samples = 0u16;
        let mut appended_samples = 0u16;
        let mut block_words = 0u32;

        loop {
            let word = word_at(frame, offset)?;
            match classify(word)? {
                WordTag::ChannelId => {
                    if let Some(open) = channel {
                        warn!(channel = open, "unterminated channel block");
                        return Err(FrameError::UnexpectedWord {
                            tag: WordTag::ChannelId,
                            context: "previous channel block still open",
                        });
                    }
                    let (chan, count) = channel_fields(word);
                    channel =
                        Some(u32::from(board) * CHANNELS_PER_BOARD + u32::from(chan));
                    declared_samples = count;
                    appended_samples = 0;
                    block_words = 0;
                }
                WordTag::Data => {
                    let Some(chan) = channel else {
                        return Err(FrameError::UnexpectedWord {
                            tag: WordTag::Data,
                            context: "expecting channel id",
                        });
                    };
                    let (a, b) = data_samples(word);
                    if appended_samples < declared_samples {
                        sink.append_sample(chan, a);
                        appended_samples += 1;
                    }
                    // Odd declared counts pad the last word's second sample
                    if appended_samples < declared_samples {
                        sink.append_sample(chan, b);
                        appended_samples += 1;
                    }
                    block_words += 1;
                }
                WordTag::DataZs => {
                    let Some(chan) = channel else {
                        return Err(FrameError::UnexpectedWord {
                            tag: WordTag::DataZs,
                            context: "expecting channel id",
                        });
                    };
                    let (bin, amplitude) = zs_fields(word);
                    sink.add_charge(chan, bin, amplitude);
                    block_words += 1;
                }
                WordTag::Trailer => {
                    let Some(chan) = channel.take() else {
                        return Err(FrameError::UnexpectedWord {
                            tag: WordTag::Trailer,
                            context: "no channel block open",
                        });
                    };
                    let declared = trailer_word_count(word);
                    if declared != block_words {
                        if self.config.tolerates_soft_errors() {
                            warn!(
                                declared,
                                counted = block_words,
                                channel = chan,
                                "channel block word count mismatch"
                            );
                        } else {
                            return Err(FrameError::WordCountMismatch {
                                declared,
                                counted: block_words,
                            });
                        }
                    }
                    sink.finish_channel(chan);
                }
                WordTag::FinalTrailer => {
                    if channel.is_some() {
                        return Err(FrameError::UnexpectedWord {
                            tag: WordTag::FinalTrailer,
                            context: "channel block still open",
                        });
                    }
                    // Not consumed here; parse_trailer owns it
                    return Ok(offset);
                }
                WordTag::Header => {
                    return Err(FrameError::UnexpectedWord {
                        tag: WordTag::Header,
                        context: "frame missing final trailer",
                    });
                }
            }
            offset += WORD_SIZE;
        }
    }

    fn parse_trailer(&self, frame: &[u8], data_end: usize) -> Result<usize> {
        let word = word_at(frame, data_end)?;
        match classify(word)? {
            WordTag::FinalTrailer => {}
            tag => {
                return Err(FrameError::UnexpectedWord {
                    tag,
                    context: "expecting final trailer",
                })
            }
        }
        let status = final_trailer_status(word);
        if status != 0 {
            return Err(FrameError::TrailerStatusSet(status));
        }
        Ok(data_end + WORD_SIZE)
    }
}
