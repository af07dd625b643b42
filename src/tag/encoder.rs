//! 20-bit to 32-bit identifier encoding
//!
//! Each 5-bit slice of the input selects one byte from a fixed table of
//! balanced codewords. Receivers decode by reversing the lookup, so the
//! table must not change.

/// Codeword table, indexed by a 5-bit slice
pub const CODE_TABLE: [u8; 32] = [
    0x00, 0x07, 0x19, 0x1E, 0x2A, 0x2D, 0x33, 0x34, 0x4B, 0x4C, 0x52, 0x55, 0x61, 0x66, 0x78, 0x7F,
    0x80, 0x87, 0x99, 0x9E, 0xAA, 0xAD, 0xB3, 0xB4, 0xCB, 0xCC, 0xD2, 0xD5, 0xE1, 0xE6, 0xF8, 0xFF,
];

/// Largest value that fits in the 20-bit input
pub const MAX_ENCODED_ID: u32 = (1 << 20) - 1;

const SLICE_BITS: u32 = 5;
const SLICE_MASK: u32 = 0x1F;

/// Encode a 20-bit value into a 32-bit identifier
///
/// The lowest slice is shifted in first, so it ends up in the most
/// significant byte of the result. Bits above bit 19 are ignored.
pub fn encode_id(val20: u32) -> u32 {
    let mut remaining = val20;
    let mut val32: u32 = 0;

    for _ in 0..4 {
        val32 <<= 8;
        val32 |= CODE_TABLE[(remaining & SLICE_MASK) as usize] as u32;
        remaining >>= SLICE_BITS;
    }

    val32
}
