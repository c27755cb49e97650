//! Error types for Art-Net output.
//!
//! This module defines the error types for the output side: packet codec
//! failures, endpoint and engine configuration problems, and socket I/O.

/// Result type alias for output operations.
pub type Result<T> = std::result::Result<T, OutputError>;

/// Error type for Art-Net output operations.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Channel-state validation failure from the core model
    #[error(transparent)]
    Stage(#[from] lumecast_core::StageError),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Node endpoint could not be parsed
    #[error("Invalid node endpoint: {0}")]
    InvalidEndpoint(String),

    /// Refresh rate outside the supported range
    #[error("Refresh rate {0} Hz outside supported range (1-44)")]
    InvalidRefreshRate(u32),

    /// Engine configuration rejected
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Packet shorter than the ArtDmx header
    #[error("Packet truncated: {len} bytes is shorter than the ArtDmx header")]
    Truncated {
        /// Received packet length in bytes
        len: usize,
    },

    /// Packet does not begin with the Art-Net header string
    #[error("Missing Art-Net header")]
    BadHeader,

    /// Packet opcode is not ArtDmx
    #[error("Unsupported opcode 0x{opcode:04x}")]
    UnsupportedOpcode {
        /// Opcode found in the packet
        opcode: u16,
    },

    /// Protocol revision older than the supported one
    #[error("Unsupported protocol version {version}")]
    UnsupportedVersion {
        /// Version found in the packet
        version: u16,
    },

    /// Declared data length disagrees with the packet contents
    #[error("Data length mismatch: declared {declared} bytes, got {actual}")]
    LengthMismatch {
        /// Length field from the packet header
        declared: usize,
        /// Channel data bytes actually present
        actual: usize,
    },
}
