//! Universe addressing and the serialized write path for channel state.
//!
//! [`UniverseManager`] owns every universe and is the only component that
//! mutates channel buffers. Writes to one universe are serialized by that
//! universe's lock, writes to different universes run in parallel, and the
//! transmit path reads through the same locks so snapshots are never torn.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::{ChannelBuffer, DMX_CHANNELS};
use crate::events::ChannelChange;
use crate::{Result, StageError};

/// Highest valid universe address (15-bit Art-Net port address space).
pub const MAX_UNIVERSE: u16 = 0x7FFF;

/// A validated Art-Net universe address.
///
/// Port addresses are 15 bits wide: 7 bits of net, 4 bits of sub-net and
/// 4 bits of universe. The constructor rejects raw values above
/// [`MAX_UNIVERSE`], so a held `UniverseId` is always encodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct UniverseId(u16);

impl UniverseId {
    /// Creates a universe address, rejecting values above [`MAX_UNIVERSE`].
    pub fn new(raw: u16) -> Result<Self> {
        if raw <= MAX_UNIVERSE {
            Ok(Self(raw))
        } else {
            Err(StageError::UniverseOutOfRange { address: raw })
        }
    }

    /// The raw 15-bit port address.
    pub fn value(self) -> u16 {
        self.0
    }

    /// Net component (bits 8-14).
    pub fn net(self) -> u8 {
        ((self.0 >> 8) & 0x7F) as u8
    }

    /// Sub-net component (bits 4-7).
    pub fn sub_net(self) -> u8 {
        ((self.0 >> 4) & 0x0F) as u8
    }

    /// Universe component (bits 0-3).
    pub fn sub_universe(self) -> u8 {
        (self.0 & 0x0F) as u8
    }
}

impl TryFrom<u16> for UniverseId {
    type Error = StageError;

    fn try_from(raw: u16) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<UniverseId> for u16 {
    fn from(id: UniverseId) -> Self {
        id.0
    }
}

impl fmt::Display for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-universe Art-Net sequence counter.
///
/// Outgoing frames carry a sequence byte so receivers can spot dropped or
/// reordered packets. On the wire 0 means "sequencing disabled", so the
/// counter cycles 1..=255 and never emits 0 once it starts advancing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter(u8);

impl SequenceCounter {
    /// Creates a counter that emits 1 on its first advance.
    pub fn new() -> Self {
        Self(0)
    }

    /// Steps to the next sequence value and returns it, cycling 1..=255.
    pub fn advance(&mut self) -> u8 {
        self.0 = match self.0 {
            u8::MAX => 1,
            n => n + 1,
        };
        self.0
    }

    /// The most recently emitted value (0 before the first advance).
    pub fn current(self) -> u8 {
        self.0
    }
}

/// One DMX universe: its address, retained channel values and transmit
/// sequence state.
#[derive(Debug, Clone)]
pub struct Universe {
    id: UniverseId,
    buffer: ChannelBuffer,
    sequence: SequenceCounter,
}

impl Universe {
    /// Creates a dark universe with the sequence counter at its start.
    pub fn new(id: UniverseId) -> Self {
        Self {
            id,
            buffer: ChannelBuffer::new(),
            sequence: SequenceCounter::new(),
        }
    }

    /// The universe's port address.
    pub fn id(&self) -> UniverseId {
        self.id
    }

    /// Read access to the channel buffer.
    pub fn buffer(&self) -> &ChannelBuffer {
        &self.buffer
    }

    /// Write access to the channel buffer.
    pub fn buffer_mut(&mut self) -> &mut ChannelBuffer {
        &mut self.buffer
    }

    /// Advances the sequence counter and snapshots the buffer for one
    /// outgoing frame.
    pub fn next_frame(&mut self) -> (u8, [u8; DMX_CHANNELS]) {
        (self.sequence.advance(), self.buffer.snapshot())
    }
}

/// Policy for universes referenced before they are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatePolicy {
    /// The first write or node registration brings a universe into being.
    #[default]
    Implicit,
    /// Universes must be created up front; writes to unknown addresses fail.
    Explicit,
}

/// Owner of all universe state and the only write path into it.
#[derive(Debug, Default)]
pub struct UniverseManager {
    universes: RwLock<HashMap<UniverseId, Arc<Mutex<Universe>>>>,
    policy: CreatePolicy,
}

impl UniverseManager {
    /// Creates an empty manager with the given creation policy.
    pub fn new(policy: CreatePolicy) -> Self {
        Self {
            universes: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// The active creation policy.
    pub fn policy(&self) -> CreatePolicy {
        self.policy
    }

    /// Creates a universe explicitly. Returns false if it already existed.
    pub fn create_universe(&self, id: UniverseId) -> bool {
        let mut universes = self.universes.write();
        if universes.contains_key(&id) {
            return false;
        }
        universes.insert(id, Arc::new(Mutex::new(Universe::new(id))));
        debug!(universe = %id, "created universe");
        true
    }

    /// Removes a universe and its retained state. Returns false if absent.
    pub fn remove_universe(&self, id: UniverseId) -> bool {
        let removed = self.universes.write().remove(&id).is_some();
        if removed {
            debug!(universe = %id, "removed universe");
        }
        removed
    }

    /// Whether the universe currently exists.
    pub fn contains(&self, id: UniverseId) -> bool {
        self.universes.read().contains_key(&id)
    }

    /// All existing universe addresses, sorted.
    pub fn universe_ids(&self) -> Vec<UniverseId> {
        let mut ids: Vec<UniverseId> = self.universes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of existing universes.
    pub fn len(&self) -> usize {
        self.universes.read().len()
    }

    /// Whether no universes exist.
    pub fn is_empty(&self) -> bool {
        self.universes.read().is_empty()
    }

    fn lookup(&self, id: UniverseId) -> Option<Arc<Mutex<Universe>>> {
        self.universes.read().get(&id).cloned()
    }

    fn resolve(&self, id: UniverseId) -> Result<Arc<Mutex<Universe>>> {
        if let Some(universe) = self.lookup(id) {
            return Ok(universe);
        }
        match self.policy {
            CreatePolicy::Implicit => {
                let mut universes = self.universes.write();
                let universe = universes
                    .entry(id)
                    .or_insert_with(|| {
                        debug!(universe = %id, "implicitly created universe");
                        Arc::new(Mutex::new(Universe::new(id)))
                    })
                    .clone();
                Ok(universe)
            }
            CreatePolicy::Explicit => Err(StageError::UnknownUniverse { universe: id }),
        }
    }

    /// Writes one channel and reports the committed change.
    ///
    /// The channel index is validated before the universe is resolved, so a
    /// rejected write never creates a universe as a side effect.
    pub fn set_channel(&self, id: UniverseId, channel: u16, value: u8) -> Result<ChannelChange> {
        ChannelBuffer::validate_channel(channel)?;
        let universe = self.resolve(id)?;
        let mut universe = universe.lock();
        universe.buffer_mut().set(channel, value)?;
        Ok(ChannelChange { channel, value })
    }

    /// Applies a batch of writes atomically and reports the committed changes.
    ///
    /// A batch with any invalid index is rejected whole. An empty batch is a
    /// no-op and does not create the universe.
    pub fn set_channels(&self, id: UniverseId, writes: &[(u16, u8)]) -> Result<Vec<ChannelChange>> {
        for &(channel, _) in writes {
            ChannelBuffer::validate_channel(channel)?;
        }
        if writes.is_empty() {
            return Ok(Vec::new());
        }
        let universe = self.resolve(id)?;
        {
            let mut universe = universe.lock();
            universe.buffer_mut().apply(writes)?;
        }
        Ok(writes
            .iter()
            .map(|&(channel, value)| ChannelChange { channel, value })
            .collect())
    }

    /// Zeroes all 512 channels of a universe and reports the changes.
    pub fn blackout(&self, id: UniverseId) -> Result<Vec<ChannelChange>> {
        let universe = self.resolve(id)?;
        {
            let mut universe = universe.lock();
            universe.buffer_mut().fill(0);
        }
        Ok((0..DMX_CHANNELS as u16)
            .map(|channel| ChannelChange { channel, value: 0 })
            .collect())
    }

    /// Reads one channel's retained value. Reads never create universes.
    pub fn channel(&self, id: UniverseId, channel: u16) -> Result<u8> {
        ChannelBuffer::validate_channel(channel)?;
        let universe = self
            .lookup(id)
            .ok_or(StageError::UnknownUniverse { universe: id })?;
        let value = universe.lock().buffer().get(channel)?;
        Ok(value)
    }

    /// Takes an atomic whole-buffer snapshot of a universe.
    pub fn snapshot(&self, id: UniverseId) -> Result<[u8; DMX_CHANNELS]> {
        let universe = self
            .lookup(id)
            .ok_or(StageError::UnknownUniverse { universe: id })?;
        let snapshot = universe.lock().buffer().snapshot();
        Ok(snapshot)
    }

    /// Advances the sequence counter and snapshots the buffer of one
    /// universe for transmission. Returns `None` for unknown universes.
    pub fn next_frame(&self, id: UniverseId) -> Option<(u8, [u8; DMX_CHANNELS])> {
        let universe = self.lookup(id)?;
        let frame = universe.lock().next_frame();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_id_bounds() {
        assert!(UniverseId::new(0).is_ok());
        assert!(UniverseId::new(MAX_UNIVERSE).is_ok());
        assert_eq!(
            UniverseId::new(MAX_UNIVERSE + 1),
            Err(StageError::UniverseOutOfRange {
                address: MAX_UNIVERSE + 1
            })
        );
    }

    #[test]
    fn test_universe_id_address_components() {
        // 0x7FFF = net 0x7F, sub-net 0xF, universe 0xF
        let id = UniverseId::new(0x7FFF).unwrap();
        assert_eq!(id.net(), 0x7F);
        assert_eq!(id.sub_net(), 0xF);
        assert_eq!(id.sub_universe(), 0xF);

        // 0x0123 = net 1, sub-net 2, universe 3
        let id = UniverseId::new(0x0123).unwrap();
        assert_eq!(id.net(), 1);
        assert_eq!(id.sub_net(), 2);
        assert_eq!(id.sub_universe(), 3);
    }

    #[test]
    fn test_universe_id_serde_rejects_out_of_range() {
        let id: UniverseId = serde_json::from_str("42").unwrap();
        assert_eq!(id.value(), 42);
        assert!(serde_json::from_str::<UniverseId>("32768").is_err());
    }

    #[test]
    fn test_sequence_counter_cycles_without_zero() {
        let mut counter = SequenceCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.advance(), 1);
        for _ in 0..253 {
            counter.advance();
        }
        assert_eq!(counter.current(), 254);
        assert_eq!(counter.advance(), 255);
        // Wraps past 255 straight to 1, skipping the reserved 0.
        assert_eq!(counter.advance(), 1);
    }

    #[test]
    fn test_new_universe_starts_dark() {
        let id = UniverseId::new(42).unwrap();
        let universe = Universe::new(id);
        assert_eq!(universe.id(), id);
        assert_eq!(universe.buffer().snapshot(), [0u8; DMX_CHANNELS]);
    }

    #[test]
    fn test_implicit_creation_on_write() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(5).unwrap();
        assert!(!manager.contains(id));
        manager.set_channel(id, 0, 1).unwrap();
        assert!(manager.contains(id));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_explicit_policy_rejects_unknown_universe() {
        let manager = UniverseManager::new(CreatePolicy::Explicit);
        let id = UniverseId::new(5).unwrap();
        assert_eq!(
            manager.set_channel(id, 0, 1),
            Err(StageError::UnknownUniverse { universe: id })
        );
        assert!(manager.create_universe(id));
        assert!(manager.set_channel(id, 0, 1).is_ok());
    }

    #[test]
    fn test_rejected_write_does_not_create_universe() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(9).unwrap();
        assert!(manager.set_channel(id, 512, 1).is_err());
        assert!(manager.set_channels(id, &[(0, 1), (700, 2)]).is_err());
        assert!(!manager.contains(id));
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(2).unwrap();
        assert_eq!(manager.set_channels(id, &[]).unwrap(), Vec::new());
        assert!(!manager.contains(id));
    }

    #[test]
    fn test_queries_never_create_universes() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(3).unwrap();
        assert_eq!(
            manager.channel(id, 0),
            Err(StageError::UnknownUniverse { universe: id })
        );
        assert_eq!(
            manager.snapshot(id),
            Err(StageError::UnknownUniverse { universe: id })
        );
        assert!(manager.next_frame(id).is_none());
        assert!(!manager.contains(id));
    }

    #[test]
    fn test_blackout_reports_all_channels() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(1).unwrap();
        manager.set_channel(id, 100, 200).unwrap();

        let changes = manager.blackout(id).unwrap();
        assert_eq!(changes.len(), DMX_CHANNELS);
        assert!(changes.iter().all(|c| c.value == 0));
        assert_eq!(manager.snapshot(id).unwrap(), [0u8; DMX_CHANNELS]);
    }

    #[test]
    fn test_create_and_remove_are_reported() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(7).unwrap();
        assert!(manager.create_universe(id));
        assert!(!manager.create_universe(id));
        assert!(manager.remove_universe(id));
        assert!(!manager.remove_universe(id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_universe_ids_are_sorted() {
        let manager = UniverseManager::default();
        for raw in [30u16, 1, 12] {
            manager.create_universe(UniverseId::new(raw).unwrap());
        }
        let ids: Vec<u16> = manager.universe_ids().iter().map(|id| id.value()).collect();
        assert_eq!(ids, vec![1, 12, 30]);
    }

    #[test]
    fn test_next_frame_advances_sequence() {
        let manager = UniverseManager::default();
        let id = UniverseId::new(0).unwrap();
        manager.set_channel(id, 0, 77).unwrap();

        let (seq1, data1) = manager.next_frame(id).unwrap();
        let (seq2, _) = manager.next_frame(id).unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
        assert_eq!(data1[0], 77);
    }
}
