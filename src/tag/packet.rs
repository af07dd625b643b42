//! Beacon packet
//!
//! ```text
//! [id31..24][id23..16][id15..8][id7..0][crc8]
//! ```
//!
//! The checksum is CRC-8 (polynomial 0x07, init 0x00, no reflection, no
//! final XOR) over the four identifier bytes.

use core::fmt;

use crate::config::tag::PACKET_LEN;
use crate::tag::id::TagId;
use crc::{Crc, CRC_8_SMBUS};

const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Number of identifier bytes covered by the checksum
const ID_LEN: usize = 4;

/// Fixed-length frame sent on every transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    bytes: [u8; PACKET_LEN],
}

impl Packet {
    /// Build the packet for a 32-bit on-air identifier
    pub fn new(identifier: u32) -> Self {
        let mut bytes = [0u8; PACKET_LEN];
        bytes[..ID_LEN].copy_from_slice(&identifier.to_be_bytes());
        bytes[ID_LEN] = calculate_checksum(&bytes[..ID_LEN]);
        Self { bytes }
    }

    /// Build the packet for a configured tag identity
    pub fn from_tag(tag: TagId) -> Self {
        Self::new(tag.on_air_id())
    }

    /// The identifier carried in bytes 0-3
    pub fn identifier(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    pub fn checksum(&self) -> u8 {
        self.bytes[ID_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.bytes
    }

    /// Check that the stored checksum matches the identifier bytes
    pub fn verify(&self) -> bool {
        calculate_checksum(&self.bytes[..ID_LEN]) == self.checksum()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:02X} {:02X} {:02X} ({:02X})",
            self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3], self.bytes[4]
        )
    }
}

/// Calculate the packet checksum
pub fn calculate_checksum(data: &[u8]) -> u8 {
    CRC.checksum(data)
}
