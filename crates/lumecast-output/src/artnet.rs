//! Art-Net ArtDmx packet codec (Art-Net 4).
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.
//! Only the ArtDmx opcode is implemented here: encoding for the transmit
//! path, decoding for tests and inbound diagnostics.

use lumecast_core::{UniverseId, DMX_CHANNELS};

use crate::error::{OutputError, Result};

/// Default Art-Net UDP port.
pub const ARTNET_PORT: u16 = 6454;

/// Art-Net packet header string, including the null terminator.
pub const ARTNET_HEADER: [u8; 8] = *b"Art-Net\0";

/// Opcode for ArtDmx (DMX512 data) packets.
pub const OP_DMX: u16 = 0x5000;

/// Protocol revision this codec speaks.
pub const PROTOCOL_VERSION: u16 = 14;

/// Byte length of the ArtDmx header before channel data.
pub const ARTDMX_HEADER_LEN: usize = 18;

/// Total byte length of a full ArtDmx packet (header plus 512 channels).
pub const ARTDMX_PACKET_LEN: usize = ARTDMX_HEADER_LEN + DMX_CHANNELS;

/// One ArtDmx frame: a universe's 512 channel values plus addressing and
/// sequence metadata.
///
/// Frames are built fresh for every transmission tick and discarded once
/// the datagram is sent; nothing retains frame history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    /// Sequence byte (cycles 1-255 in normal operation; 0 disables
    /// sequencing).
    pub sequence: u8,
    /// Physical input port, informational only.
    pub physical: u8,
    /// Destination universe address.
    pub universe: UniverseId,
    /// Channel values in slot order.
    pub channels: [u8; DMX_CHANNELS],
}

impl ArtDmx {
    /// Creates a frame with the physical port set to 0.
    pub fn new(universe: UniverseId, sequence: u8, channels: [u8; DMX_CHANNELS]) -> Self {
        Self {
            sequence,
            physical: 0,
            universe,
            channels,
        }
    }

    /// Serializes the frame into a 530-byte ArtDmx datagram.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = vec![0u8; ARTDMX_PACKET_LEN];

        // Header: "Art-Net\0"
        packet[0..8].copy_from_slice(&ARTNET_HEADER);

        // OpCode: OpDmx (0x5000), little-endian
        packet[8..10].copy_from_slice(&OP_DMX.to_le_bytes());

        // Protocol version (14), big-endian
        packet[10..12].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());

        // Sequence
        packet[12] = self.sequence;

        // Physical
        packet[13] = self.physical;

        // Port address, low byte first: sub-uni, then net
        packet[14..16].copy_from_slice(&self.universe.value().to_le_bytes());

        // Length (512 channels, big-endian)
        packet[16..18].copy_from_slice(&(DMX_CHANNELS as u16).to_be_bytes());

        // DMX data
        packet[ARTDMX_HEADER_LEN..].copy_from_slice(&self.channels);

        packet
    }

    /// Parses an ArtDmx datagram; the exact inverse of [`ArtDmx::encode`].
    ///
    /// Rejects packets with a wrong header, opcode or protocol revision,
    /// and any frame not carrying exactly 512 channel values. Revisions
    /// newer than 14 are accepted.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        if packet.len() < ARTDMX_HEADER_LEN {
            return Err(OutputError::Truncated { len: packet.len() });
        }
        if packet[0..8] != ARTNET_HEADER {
            return Err(OutputError::BadHeader);
        }
        let opcode = u16::from_le_bytes([packet[8], packet[9]]);
        if opcode != OP_DMX {
            return Err(OutputError::UnsupportedOpcode { opcode });
        }
        let version = u16::from_be_bytes([packet[10], packet[11]]);
        if version < PROTOCOL_VERSION {
            return Err(OutputError::UnsupportedVersion { version });
        }

        let sequence = packet[12];
        let physical = packet[13];
        let universe = UniverseId::new(u16::from_le_bytes([packet[14], packet[15]]))?;

        let declared = u16::from_be_bytes([packet[16], packet[17]]) as usize;
        let actual = packet.len() - ARTDMX_HEADER_LEN;
        if declared != DMX_CHANNELS || actual != declared {
            return Err(OutputError::LengthMismatch { declared, actual });
        }

        let mut channels = [0u8; DMX_CHANNELS];
        channels.copy_from_slice(&packet[ARTDMX_HEADER_LEN..]);

        Ok(Self {
            sequence,
            physical,
            universe,
            channels,
        })
    }
}
