//! wavedaq-core: Core types for waveform digitiser data processing.
//!
//! This crate provides the foundational types shared by the decoder and
//! analysis crates:
//!
//! - [`Waveform`] - One channel's ordered sample sequence plus cached
//!   derived statistics (baseline, over-threshold indices, integral)
//! - [`Event`] - A set of same-trigger waveforms keyed by channel id
//! - [`ChannelOracle`] - Lookup from channel id to kind and readable name

pub mod channel;
pub mod error;
pub mod event;
pub mod waveform;

pub use channel::{ChannelInfo, ChannelKind, ChannelOracle, ChannelTable};
pub use error::{Error, Result};
pub use event::Event;
pub use waveform::Waveform;
