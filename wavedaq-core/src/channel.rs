//! Channel-id lookup: id to readout kind and human-readable name.
//!
//! The readout mapping itself is maintained elsewhere; this crate only
//! consumes it through the [`ChannelOracle`] trait. A missing id is a valid
//! outcome and maps to [`ChannelKind::Unknown`], never to an error.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Readout kind of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelKind {
    /// Ordinary single-pulse readout channel.
    Pulse,
    /// Veto-style channel read out for multi-peak counting.
    Veto,
    /// Monitoring channel not used for physics.
    Monitor,
    /// Id not present in the readout mapping.
    Unknown,
}

/// Kind and readable name for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelInfo {
    /// Readout kind.
    pub kind: ChannelKind,
    /// Human-readable channel name.
    pub name: String,
}

impl ChannelInfo {
    /// Creates a channel description.
    #[must_use]
    pub fn new(kind: ChannelKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// The sentinel returned for ids missing from the mapping.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(ChannelKind::Unknown, "unknown")
    }
}

/// Lookup from channel id to kind and name.
pub trait ChannelOracle {
    /// Resolves a channel id. Missing ids yield [`ChannelInfo::unknown`].
    fn lookup(&self, id: u32) -> ChannelInfo;
}

/// Map-backed [`ChannelOracle`] implementation.
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
    entries: HashMap<u32, ChannelInfo>,
}

impl ChannelTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a channel description.
    pub fn insert(&mut self, id: u32, info: ChannelInfo) {
        self.entries.insert(id, info);
    }

    /// Number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no channels are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ChannelOracle for ChannelTable {
    fn lookup(&self, id: u32) -> ChannelInfo {
        self.entries
            .get(&id)
            .cloned()
            .unwrap_or_else(ChannelInfo::unknown)
    }
}

impl FromIterator<(u32, ChannelInfo)> for ChannelTable {
    fn from_iter<T: IntoIterator<Item = (u32, ChannelInfo)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let table: ChannelTable = [(4, ChannelInfo::new(ChannelKind::Veto, "veto-east"))]
            .into_iter()
            .collect();
        let info = table.lookup(4);
        assert_eq!(info.kind, ChannelKind::Veto);
        assert_eq!(info.name, "veto-east");
    }

    #[test]
    fn test_lookup_missing_is_unknown() {
        let table = ChannelTable::new();
        let info = table.lookup(99);
        assert_eq!(info.kind, ChannelKind::Unknown);
        assert_eq!(info.name, "unknown");
    }
}
