//! Fixed-size DMX channel buffers.
//!
//! A DMX512 universe carries exactly 512 channel slots. [`ChannelBuffer`]
//! holds the retained value of every slot so the transmit path can always
//! produce a full frame no matter how sparse the incoming writes are.

use crate::{Result, StageError};

/// Number of channel slots in a DMX512 universe.
pub const DMX_CHANNELS: usize = 512;

/// Retained values for all 512 channels of one universe.
///
/// Slots are indexed 0-511 and start at 0 (dark) until written. Values are
/// `u8`, so the 0-255 level range is enforced by the type system and only
/// the channel index needs runtime validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBuffer {
    slots: [u8; DMX_CHANNELS],
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBuffer {
    /// Creates a buffer with every slot at 0.
    pub fn new() -> Self {
        Self {
            slots: [0; DMX_CHANNELS],
        }
    }

    /// Validates a channel index against the DMX512 slot range.
    pub fn validate_channel(channel: u16) -> Result<()> {
        if (channel as usize) < DMX_CHANNELS {
            Ok(())
        } else {
            Err(StageError::ChannelOutOfRange { channel })
        }
    }

    /// Returns the retained value of one channel.
    pub fn get(&self, channel: u16) -> Result<u8> {
        Self::validate_channel(channel)?;
        Ok(self.slots[channel as usize])
    }

    /// Writes one channel and returns the value it replaced.
    pub fn set(&mut self, channel: u16, value: u8) -> Result<u8> {
        Self::validate_channel(channel)?;
        let slot = &mut self.slots[channel as usize];
        let previous = *slot;
        *slot = value;
        Ok(previous)
    }

    /// Applies a batch of writes, all or nothing.
    ///
    /// Every index is validated before any slot changes, so a batch with one
    /// bad index leaves the buffer untouched.
    pub fn apply(&mut self, writes: &[(u16, u8)]) -> Result<()> {
        for &(channel, _) in writes {
            Self::validate_channel(channel)?;
        }
        for &(channel, value) in writes {
            self.slots[channel as usize] = value;
        }
        Ok(())
    }

    /// Sets every slot to the same value.
    pub fn fill(&mut self, value: u8) {
        self.slots = [value; DMX_CHANNELS];
    }

    /// Copies the current state of all 512 slots.
    pub fn snapshot(&self) -> [u8; DMX_CHANNELS] {
        self.slots
    }
}
