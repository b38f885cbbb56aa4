//! End-to-end decode tests driving the strategy trait the way the event
//! assembler does: parse_header, parse_data, parse_trailer.

use wavedaq_formats::fadc::{
    checksum, FRAME_TYPE_FULL, FRAME_TYPE_PARTIAL, FULL_ITEM_SIZE, HEADER_LEN, PARTIAL_ITEM_SIZE,
    SUPPORTED_REVISION,
};
use wavedaq_formats::{DecoderConfig, FadcDecoder, FrameDecoder, SampleSink, Strictness};

#[derive(Default)]
struct RecordingSink {
    appended: Vec<(u32, i16)>,
    charges: Vec<(u32, usize, i16)>,
    finished: Vec<u32>,
}

impl SampleSink for RecordingSink {
    fn append_sample(&mut self, channel: u32, value: i16) {
        self.appended.push((channel, value));
    }
    fn add_charge(&mut self, channel: u32, bin: usize, value: i16) {
        self.charges.push((channel, bin, value));
    }
    fn finish_channel(&mut self, channel: u32) {
        self.finished.push(channel);
    }
}

fn header(
    frame_type: u8,
    item_size: u8,
    item_count: u16,
    event_index: u32,
    board: u16,
    channel: u8,
) -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_LEN];
    let frame_size = HEADER_LEN as u32 + u32::from(item_count) * u32::from(item_size) + 4;
    bytes[0..4].copy_from_slice(&frame_size.to_be_bytes());
    bytes[4] = 1;
    bytes[5] = frame_type;
    bytes[6] = SUPPORTED_REVISION;
    bytes[7] = item_size;
    bytes[8..10].copy_from_slice(&item_count.to_be_bytes());
    bytes[10..14].copy_from_slice(&event_index.to_be_bytes());
    bytes[14..16].copy_from_slice(&board.to_be_bytes());
    bytes[20..24].copy_from_slice(&42u32.to_be_bytes());
    bytes[24..28].copy_from_slice(&7u32.to_be_bytes());
    bytes[28] = channel;
    bytes
}

fn full_frame(event_index: u32, board: u16, channel: u8, samples: &[i16]) -> Vec<u8> {
    let mut frame = header(
        FRAME_TYPE_FULL,
        FULL_ITEM_SIZE,
        samples.len() as u16,
        event_index,
        board,
        channel,
    );
    for sample in samples {
        frame.extend_from_slice(&sample.to_be_bytes());
    }
    let sum = checksum(&frame[HEADER_LEN..]);
    frame.extend_from_slice(&sum.to_be_bytes());
    frame
}

fn partial_frame(event_index: u32, board: u16, items: &[(u8, u16, u16)]) -> Vec<u8> {
    let mut frame = header(
        FRAME_TYPE_PARTIAL,
        PARTIAL_ITEM_SIZE,
        items.len() as u16,
        event_index,
        board,
        0,
    );
    for &(channel, bin, amplitude) in items {
        let word = (u32::from(channel) << 24) | (u32::from(bin) << 12) | u32::from(amplitude);
        frame.extend_from_slice(&word.to_be_bytes());
    }
    let sum = checksum(&frame[HEADER_LEN..]);
    frame.extend_from_slice(&sum.to_be_bytes());
    frame
}

fn short_trace_config() -> DecoderConfig {
    DecoderConfig {
        trace_length: 8,
        ..DecoderConfig::default()
    }
}

#[test]
fn full_readout_frame_decodes_every_sample() {
    let samples: Vec<i16> = (0..8).map(|i| i * 100 - 300).collect();
    let frame = full_frame(11, 2, 5, &samples);
    let decoder = FadcDecoder::new(short_trace_config());

    let info = decoder.parse_header(&frame).unwrap();
    assert_eq!(info.event_index, 11);
    assert_eq!(info.board, 2);
    assert_eq!(info.timestamp_secs, 42);
    assert_eq!(info.timestamp_nanos, 7);

    let mut sink = RecordingSink::default();
    let data_end = decoder.parse_data(&frame, &mut sink).unwrap();
    let frame_len = decoder.parse_trailer(&frame, data_end).unwrap();
    assert_eq!(frame_len, frame.len());

    let channel = 2 * 64 + 5;
    let decoded: Vec<i16> = sink.appended.iter().map(|&(_, v)| v).collect();
    assert_eq!(decoded, samples);
    assert!(sink.appended.iter().all(|&(c, _)| c == channel));
    assert_eq!(sink.finished, vec![channel]);
}

#[test]
fn partial_readout_frame_scatters_charge() {
    let frame = partial_frame(3, 1, &[(0, 100, 500), (0, 101, 300), (9, 40, 12)]);
    let decoder = FadcDecoder::new(short_trace_config());

    decoder.parse_header(&frame).unwrap();
    let mut sink = RecordingSink::default();
    decoder.parse_data(&frame, &mut sink).unwrap();

    assert_eq!(
        sink.charges,
        vec![(64, 100, 500), (64, 101, 300), (64 + 9, 40, 12)]
    );
    // Each touched channel finished exactly once
    assert_eq!(sink.finished, vec![64, 64 + 9]);
}

#[test]
fn corrupt_checksum_is_soft_then_hard() {
    let mut frame = full_frame(0, 0, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let last = frame.len() - 1;
    frame[last] ^= 0xFF;

    let lenient = FadcDecoder::new(short_trace_config());
    let mut sink = RecordingSink::default();
    let data_end = lenient.parse_data(&frame, &mut sink).unwrap();
    assert!(lenient.parse_trailer(&frame, data_end).is_ok());

    let strict = FadcDecoder::new(DecoderConfig {
        strictness: Strictness::Strict,
        trace_length: 8,
    });
    assert!(strict.parse_trailer(&frame, data_end).is_err());
}

#[test]
fn wrong_item_count_rejected_for_full_readout() {
    // Config expects 8-sample traces, frame declares 6
    let frame = full_frame(0, 0, 0, &[1, 2, 3, 4, 5, 6]);
    let decoder = FadcDecoder::new(short_trace_config());
    assert!(decoder.parse_header(&frame).is_err());
}
