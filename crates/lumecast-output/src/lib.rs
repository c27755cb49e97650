//! Lumecast Output - Art-Net Transmission Engine
//!
//! This crate turns the channel state held in `lumecast-core` into a
//! continuous stream of Art-Net ArtDmx datagrams:
//! - **Codec**: ArtDmx packet encoding and decoding
//! - **Nodes**: universe-to-endpoint routing with idempotent registration
//! - **Scheduler**: fixed-rate transmit loop with drift-free cadence
//! - **Engine**: one facade owning state, routing and the loop lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumecast_core::UniverseId;
//! use lumecast_output::{EngineConfig, OutputEngine};
//!
//! # async fn demo() -> lumecast_output::Result<()> {
//! let mut engine = OutputEngine::new(EngineConfig::default())?;
//! let universe = UniverseId::new(0)?;
//! engine.register_node(universe, "127.0.0.1:6454".parse().unwrap())?;
//! engine.start().await?;
//!
//! // Fixtures keep refreshing even when nothing changes.
//! engine.set_channel(universe, 0, 255)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`artnet`] - ArtDmx frame codec
//! - [`nodes`] - Node registry and declarative node entries
//! - [`scheduler`] - The transmit loop and its counters
//! - [`engine`] - Engine facade and configuration
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;

/// ArtDmx frame codec
pub mod artnet;
/// Engine facade and configuration
pub mod engine;
/// Universe-to-node routing
pub mod nodes;
/// Fixed-rate transmit loop
pub mod scheduler;

// Re-exports
pub use error::{OutputError, Result};

pub use artnet::{ArtDmx, ARTDMX_PACKET_LEN, ARTNET_PORT};
pub use engine::{EngineConfig, OutputEngine, DEFAULT_REFRESH_RATE, MAX_REFRESH_RATE};
pub use nodes::{NodeConfig, NodeRegistry};
pub use scheduler::TransmitStats;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_constant() {
        assert_eq!(ARTNET_PORT, 6454);
    }

    #[test]
    fn test_default_rate_is_within_bounds() {
        assert!(DEFAULT_REFRESH_RATE >= 1);
        assert!(DEFAULT_REFRESH_RATE <= MAX_REFRESH_RATE);
    }
}
