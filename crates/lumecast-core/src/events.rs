//! Change events emitted after committed writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::universe::UniverseId;

/// One committed channel write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelChange {
    /// Channel index within the universe (0-511).
    pub channel: u16,
    /// The value the channel now holds.
    pub value: u8,
}

/// Notification that a mutation was committed to a universe.
///
/// Events carry only the written pairs, not the whole buffer, to keep
/// notification payloads small. Delivery is best-effort and at-most-once;
/// consumers that need authoritative state pull a snapshot instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The universe that was written.
    pub universe: UniverseId,
    /// The committed writes, in request order.
    pub changes: Vec<ChannelChange>,
    /// When the write was committed.
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event stamped with the current time.
    pub fn new(universe: UniverseId, changes: Vec<ChannelChange>) -> Self {
        Self {
            universe,
            changes,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_serde_roundtrip() {
        let event = ChangeEvent::new(
            UniverseId::new(3).unwrap(),
            vec![
                ChannelChange {
                    channel: 0,
                    value: 255,
                },
                ChannelChange {
                    channel: 1,
                    value: 128,
                },
            ],
        );

        let json = serde_json::to_string(&event).unwrap();
        let restored: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn test_universe_serializes_as_raw_address() {
        let event = ChangeEvent::new(UniverseId::new(12).unwrap(), Vec::new());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["universe"], 12);
    }
}
