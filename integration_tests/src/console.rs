//! Tag console line parsing.
//!
//! The firmware logs one line per event as `<LEVEL> <message>`, with the
//! level padded to five characters.

use crc::{Crc, CRC_8_SMBUS};

/// CRC-8 used by the tag packet (polynomial 0x07, init 0x00)
const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Packet length in bytes: 4 id bytes plus checksum
pub const PACKET_LEN: usize = 5;

/// Calculate the packet checksum over the identifier bytes.
pub fn calculate_checksum(data: &[u8]) -> u8 {
    CRC.checksum(data)
}

/// Packet announced by the tag at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banner {
    pub bytes: [u8; PACKET_LEN],
}

impl Banner {
    /// Identifier carried in bytes 0-3, big-endian.
    pub fn identifier(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    /// Checksum byte as announced.
    pub fn checksum(&self) -> u8 {
        self.bytes[4]
    }

    /// Whether the announced checksum matches the identifier bytes.
    pub fn checksum_valid(&self) -> bool {
        calculate_checksum(&self.bytes[..4]) == self.checksum()
    }
}

/// One recognised console event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// `CTT test tag XX XX XX XX (CC)`
    Banner(Banner),
    /// Radio configured
    RadioReady,
    /// Radio configuration failed, with the reported error
    RadioInitFailed(String),
    /// Packet sent
    TxDone,
    /// Transmission failed, with the reported error
    TxFailed(String),
    /// Tag identity could not be resolved
    InvalidTag(String),
    /// Anything else, e.g. bootloader output
    Other(String),
}

/// Strip the level prefix, if any.
fn message(line: &str) -> &str {
    let line = line.trim();
    for level in ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"] {
        if let Some(rest) = line.strip_prefix(level) {
            return rest.trim_start();
        }
    }
    line
}

/// Parse `XX XX XX XX (CC)`.
fn parse_banner(text: &str) -> Option<Banner> {
    let (id_part, crc_part) = text.split_once('(')?;
    let crc_part = crc_part.strip_suffix(')')?;

    let mut bytes = [0u8; PACKET_LEN];
    let mut count = 0;
    for token in id_part.split_whitespace() {
        if count == 4 {
            return None;
        }
        bytes[count] = u8::from_str_radix(token, 16).ok()?;
        count += 1;
    }
    if count != 4 {
        return None;
    }
    bytes[4] = u8::from_str_radix(crc_part.trim(), 16).ok()?;

    Some(Banner { bytes })
}

/// Classify one console line.
pub fn parse_line(line: &str) -> ConsoleEvent {
    let msg = message(line);

    if let Some(rest) = msg.strip_prefix("CTT test tag ") {
        if let Some(banner) = parse_banner(rest) {
            return ConsoleEvent::Banner(banner);
        }
    }
    if msg == "Radio initialised" {
        return ConsoleEvent::RadioReady;
    }
    if msg == "TX done" {
        return ConsoleEvent::TxDone;
    }
    if let Some(err) = msg.strip_prefix("Radio init failed: ") {
        return ConsoleEvent::RadioInitFailed(err.to_string());
    }
    if let Some(err) = msg.strip_prefix("TX failed: ") {
        return ConsoleEvent::TxFailed(err.to_string());
    }
    if let Some(err) = msg.strip_prefix("Invalid tag identifier: ") {
        return ConsoleEvent::InvalidTag(err.to_string());
    }

    ConsoleEvent::Other(msg.to_string())
}

/// Parse a hexadecimal identifier with optional `0x` prefix.
pub fn parse_hex_id(text: &str) -> anyhow::Result<u32> {
    let digits = text
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .replace('_', "");
    u32::from_str_radix(&digits, 16).map_err(|e| anyhow::anyhow!("Invalid tag id {:?}: {}", text, e))
}
