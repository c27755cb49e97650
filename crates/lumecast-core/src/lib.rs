//! Lumecast Core - DMX Channel-State Domain Model
//!
//! This crate contains the core domain model for Lumecast, including:
//! - 512-slot channel buffers, one per universe
//! - Universe addressing and per-universe sequence counters
//! - The universe manager that serializes every channel mutation
//! - Change events for live views and effect engines
//! - Logging configuration shared by the daemon and tools

#![warn(missing_docs)]

use thiserror::Error;

pub mod buffer;
pub mod events;
pub mod logging;
pub mod universe;

// --- Re-exports grouped by category ---

// Channel state
pub use buffer::{ChannelBuffer, DMX_CHANNELS};
pub use universe::{CreatePolicy, SequenceCounter, Universe, UniverseId, UniverseManager};

// Change notification
pub use events::{ChangeEvent, ChannelChange};

// Logging
pub use logging::LogConfig;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Channel index outside the DMX512 slot range
    #[error("Channel {channel} out of range (0-511)")]
    ChannelOutOfRange {
        /// The rejected channel index
        channel: u16,
    },

    /// Universe address outside the 15-bit Art-Net port address space
    #[error("Universe address {address} out of range (0-32767)")]
    UniverseOutOfRange {
        /// The rejected raw address
        address: u16,
    },

    /// Universe has not been created and implicit creation is disabled
    #[error("Unknown universe {universe}")]
    UnknownUniverse {
        /// The universe that was not found
        universe: UniverseId,
    },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, StageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StageError::ChannelOutOfRange { channel: 512 };
        assert_eq!(err.to_string(), "Channel 512 out of range (0-511)");

        let err = StageError::UniverseOutOfRange { address: 40000 };
        assert_eq!(err.to_string(), "Universe address 40000 out of range (0-32767)");

        let universe = UniverseId::new(7).unwrap();
        let err = StageError::UnknownUniverse { universe };
        assert_eq!(err.to_string(), "Unknown universe 7");
    }
}
