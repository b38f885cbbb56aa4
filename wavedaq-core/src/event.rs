//! Event type: a set of same-trigger waveforms keyed by channel id.

use std::collections::btree_map::{BTreeMap, Values};

use tracing::warn;

use crate::waveform::Waveform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One acquisition trigger's worth of waveforms.
///
/// Channel ids are unique within an event; inserting a duplicate is rejected
/// with a warning and the original waveform is kept. Per-event observables
/// (extrema, time span) are always derived from the constituent waveforms.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    id: u64,
    timestamp_secs: u32,
    timestamp_nanos: u32,
    waveforms: BTreeMap<u32, Waveform>,
    ok: bool,
}

impl Event {
    /// Creates an empty event.
    #[must_use]
    pub fn new(id: u64, timestamp_secs: u32, timestamp_nanos: u32) -> Self {
        Self {
            id,
            timestamp_secs,
            timestamp_nanos,
            waveforms: BTreeMap::new(),
            ok: true,
        }
    }

    /// Event identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Trigger timestamp, whole seconds.
    #[inline]
    #[must_use]
    pub fn timestamp_secs(&self) -> u32 {
        self.timestamp_secs
    }

    /// Trigger timestamp, sub-second part in nanoseconds.
    #[inline]
    #[must_use]
    pub fn timestamp_nanos(&self) -> u32 {
        self.timestamp_nanos
    }

    /// Validity flag for partially corrupted events.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Marks the event as (in)valid.
    pub fn set_ok(&mut self, ok: bool) {
        self.ok = ok;
    }

    /// Adds a waveform to the event.
    ///
    /// Returns false and keeps the original if the channel id is already
    /// present.
    pub fn add_waveform(&mut self, waveform: Waveform) -> bool {
        let id = waveform.id();
        if self.waveforms.contains_key(&id) {
            warn!(event = self.id, channel = id, "duplicate channel id rejected");
            return false;
        }
        self.waveforms.insert(id, waveform);
        true
    }

    /// Removes and returns the waveform for a channel, if present.
    pub fn remove_waveform(&mut self, id: u32) -> Option<Waveform> {
        self.waveforms.remove(&id)
    }

    /// The waveform for a channel, if present.
    #[must_use]
    pub fn waveform(&self, id: u32) -> Option<&Waveform> {
        self.waveforms.get(&id)
    }

    /// Mutable access to the waveform for a channel, if present.
    pub fn waveform_mut(&mut self, id: u32) -> Option<&mut Waveform> {
        self.waveforms.get_mut(&id)
    }

    /// Iterates over the waveforms in ascending channel-id order.
    pub fn waveforms(&self) -> Values<'_, u32, Waveform> {
        self.waveforms.values()
    }

    /// Mutable iteration over the waveforms in ascending channel-id order.
    pub fn waveforms_mut(&mut self) -> impl Iterator<Item = &mut Waveform> {
        self.waveforms.values_mut()
    }

    /// Number of waveforms in the event.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.waveforms.len()
    }

    /// Returns true if the event holds no waveforms.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waveforms.is_empty()
    }

    /// Largest sample across all waveforms.
    #[must_use]
    pub fn max_sample(&self) -> Option<i16> {
        self.waveforms.values().filter_map(Waveform::max_sample).max()
    }

    /// Smallest sample across all waveforms.
    #[must_use]
    pub fn min_sample(&self) -> Option<i16> {
        self.waveforms.values().filter_map(Waveform::min_sample).min()
    }

    /// Length of the longest trace in the event, in samples.
    #[must_use]
    pub fn time_span(&self) -> usize {
        self.waveforms.values().map(Waveform::len).max().unwrap_or(0)
    }
}
