//! RFM69 register map and parameter conversions
//!
//! The conversions are pure so they can be checked without hardware. All
//! frequency registers are in units of FSTEP = FXOSC / 2^19.

use crate::radio::traits::{DataShaping, FskParams, RadioError, MAX_SYNC_WORD_LEN};

/// Crystal oscillator frequency
pub const FXOSC_HZ: u64 = 32_000_000;

/// Expected contents of the version register
pub const CHIP_VERSION: u8 = 0x24;

/// Largest payload the driver sends (the FIFO is 66 bytes)
pub const MAX_PACKET_LEN: usize = 64;

/// Register addresses
pub mod reg {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const DATA_MODUL: u8 = 0x02;
    pub const BITRATE_MSB: u8 = 0x03;
    pub const BITRATE_LSB: u8 = 0x04;
    pub const FDEV_MSB: u8 = 0x05;
    pub const FDEV_LSB: u8 = 0x06;
    pub const FRF_MSB: u8 = 0x07;
    pub const FRF_MID: u8 = 0x08;
    pub const FRF_LSB: u8 = 0x09;
    pub const VERSION: u8 = 0x10;
    pub const PA_LEVEL: u8 = 0x11;
    pub const OCP: u8 = 0x13;
    pub const RX_BW: u8 = 0x19;
    pub const IRQ_FLAGS1: u8 = 0x27;
    pub const IRQ_FLAGS2: u8 = 0x28;
    pub const PREAMBLE_MSB: u8 = 0x2C;
    pub const PREAMBLE_LSB: u8 = 0x2D;
    pub const SYNC_CONFIG: u8 = 0x2E;
    pub const SYNC_VALUE1: u8 = 0x2F;
    pub const PACKET_CONFIG1: u8 = 0x37;
    pub const PAYLOAD_LENGTH: u8 = 0x38;
    pub const FIFO_THRESH: u8 = 0x3C;
    pub const TEST_PA1: u8 = 0x5A;
    pub const TEST_PA2: u8 = 0x5C;
}

/// SPI address bit selecting a write access
pub const WRITE_ACCESS: u8 = 0x80;

/// Operating modes (RegOpMode bits 4-2, sequencer on, listen off)
pub mod mode {
    pub const STANDBY: u8 = 0x04;
    pub const TX: u8 = 0x0C;
    pub const MASK: u8 = 0x1C;
}

/// IRQ flag bits
pub mod irq {
    /// RegIrqFlags1: operating mode switch complete
    pub const MODE_READY: u8 = 0x80;
    /// RegIrqFlags2: writing this bit clears the FIFO
    pub const FIFO_OVERRUN: u8 = 0x10;
    /// RegIrqFlags2: packet fully transmitted
    pub const PACKET_SENT: u8 = 0x08;
}

/// RegPacketConfig1 bits
pub mod packet_config {
    pub const VARIABLE_LENGTH: u8 = 0x80;
    pub const CRC_ON: u8 = 0x10;
}

/// RegSyncConfig sync-on bit
pub const SYNC_ON: u8 = 0x80;

/// RegFifoThresh: start TX as soon as the FIFO holds a byte, threshold 15
pub const FIFO_THRESH_TX_ON_NOT_EMPTY: u8 = 0x8F;

/// RegRxBw DC cancellation cut-off (4% of bandwidth, reset value)
const RX_BW_DCC: u8 = 0x40;

/// Over-current protection on, 95 mA trim
pub const OCP_ON: u8 = 0x1A;
pub const OCP_OFF: u8 = 0x0F;

/// Test registers for the +20 dBm boost mode
pub const TEST_PA1_NORMAL: u8 = 0x55;
pub const TEST_PA1_BOOST: u8 = 0x5D;
pub const TEST_PA2_NORMAL: u8 = 0x70;
pub const TEST_PA2_BOOST: u8 = 0x7C;

const PA0_ON: u8 = 0x80;
const PA1_ON: u8 = 0x40;
const PA2_ON: u8 = 0x20;

/// Supported carrier bands in Hz
const BANDS_HZ: [(u32, u32); 3] = [
    (290_000_000, 340_000_000),
    (431_000_000, 510_000_000),
    (862_000_000, 1_020_000_000),
];

const MIN_BIT_RATE_BPS: u32 = 1_200;
const MAX_BIT_RATE_BPS: u32 = 300_000;
const MIN_DEVIATION_HZ: u32 = 600;
/// Deviation plus half the bit rate must stay under this
const MAX_DEVIATION_SPAN_HZ: u32 = 500_000;
/// Tolerance when matching a requested receive bandwidth
const RX_BW_TOLERANCE_HZ: u32 = 10;

/// Convert a frequency in Hz to FSTEP units
fn to_fstep(hz: u32) -> u32 {
    (((hz as u64) << 19) / FXOSC_HZ) as u32
}

/// Carrier frequency register value (24 bits)
pub fn frf(frequency_hz: u32) -> Result<u32, RadioError> {
    let in_band = BANDS_HZ
        .iter()
        .any(|&(low, high)| (low..=high).contains(&frequency_hz));
    if !in_band {
        return Err(RadioError::InvalidFrequency);
    }
    Ok(to_fstep(frequency_hz))
}

/// Bit rate register value
pub fn bitrate(bit_rate_bps: u32) -> Result<u16, RadioError> {
    if !(MIN_BIT_RATE_BPS..=MAX_BIT_RATE_BPS).contains(&bit_rate_bps) {
        return Err(RadioError::InvalidBitRate);
    }
    Ok((FXOSC_HZ / bit_rate_bps as u64) as u16)
}

/// Frequency deviation register value (14 bits)
pub fn fdev(deviation_hz: u32, bit_rate_bps: u32) -> Result<u16, RadioError> {
    if deviation_hz < MIN_DEVIATION_HZ
        || deviation_hz.saturating_add(bit_rate_bps / 2) > MAX_DEVIATION_SPAN_HZ
    {
        return Err(RadioError::InvalidDeviation);
    }
    Ok(to_fstep(deviation_hz) as u16)
}

/// Receive bandwidth register value
///
/// The FSK bandwidth is FXOSC / (mant * 2^(exp + 2)); the request must match
/// one of the selectable values.
pub fn rx_bw(rx_bandwidth_hz: u32) -> Result<u8, RadioError> {
    const MANTISSAS: [(u64, u8); 3] = [(16, 0b00), (20, 0b01), (24, 0b10)];

    for exp in 0..=7u8 {
        for &(mant, mant_bits) in &MANTISSAS {
            let bw = (FXOSC_HZ / (mant << (exp + 2))) as u32;
            if bw.abs_diff(rx_bandwidth_hz) <= RX_BW_TOLERANCE_HZ {
                return Ok(RX_BW_DCC | (mant_bits << 3) | exp);
            }
        }
    }
    Err(RadioError::InvalidRxBandwidth)
}

/// Power amplifier register settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaSettings {
    pub pa_level: u8,
    pub ocp: u8,
    pub test_pa1: u8,
    pub test_pa2: u8,
}

/// Power amplifier settings for a target output power
///
/// Standard modules only have PA0 (-18..=13 dBm). High power modules use
/// PA1 (-2..=13 dBm), PA1+PA2 (14..=17 dBm) and the boost mode (18..=20 dBm).
pub fn pa_settings(power_dbm: i8, high_power: bool) -> Result<PaSettings, RadioError> {
    let normal = |pa_level: u8| PaSettings {
        pa_level,
        ocp: OCP_ON,
        test_pa1: TEST_PA1_NORMAL,
        test_pa2: TEST_PA2_NORMAL,
    };
    let power = power_dbm as i16;

    match (high_power, power) {
        (false, -18..=13) => Ok(normal(PA0_ON | (power + 18) as u8)),
        (true, -2..=13) => Ok(normal(PA1_ON | (power + 18) as u8)),
        (true, 14..=17) => Ok(normal(PA1_ON | PA2_ON | (power + 14) as u8)),
        (true, 18..=20) => Ok(PaSettings {
            pa_level: PA1_ON | PA2_ON | (power + 11) as u8,
            ocp: OCP_OFF,
            test_pa1: TEST_PA1_BOOST,
            test_pa2: TEST_PA2_BOOST,
        }),
        _ => Err(RadioError::InvalidOutputPower),
    }
}

/// Preamble length in bytes
pub fn preamble_bytes(preamble_bits: u16) -> Result<u16, RadioError> {
    if preamble_bits % 8 != 0 {
        return Err(RadioError::InvalidPreambleLength);
    }
    Ok(preamble_bits / 8)
}

/// RegSyncConfig value for a sync word
pub fn sync_config(sync: &[u8]) -> Result<u8, RadioError> {
    if sync.is_empty() || sync.len() > MAX_SYNC_WORD_LEN || sync.contains(&0x00) {
        return Err(RadioError::InvalidSyncWord);
    }
    Ok(SYNC_ON | (((sync.len() - 1) as u8) << 3))
}

/// RegDataModul value: packet mode, FSK, with the given shaping
pub fn data_modul(shaping: DataShaping) -> u8 {
    match shaping {
        DataShaping::None => 0b00,
        DataShaping::Gaussian1_0 => 0b01,
        DataShaping::Gaussian0_5 => 0b10,
        DataShaping::Gaussian0_3 => 0b11,
    }
}

/// RegPacketConfig1 value
pub fn packet_config1(fixed_length: bool, radio_crc: bool) -> u8 {
    let mut value = 0;
    if !fixed_length {
        value |= packet_config::VARIABLE_LENGTH;
    }
    if radio_crc {
        value |= packet_config::CRC_ON;
    }
    value
}

/// Time on air of one frame in microseconds
///
/// Counts preamble, sync word, the length byte in variable mode, the
/// payload and the radio CRC.
pub fn time_on_air_us(params: &FskParams, sync_len: usize, payload_len: usize, fixed_length: bool) -> u32 {
    let preamble = (params.preamble_bits / 8) as usize;
    let length_byte = if fixed_length { 0 } else { 1 };
    let crc = if params.radio_crc { 2 } else { 0 };
    let bits = ((preamble + sync_len + length_byte + payload_len + crc) * 8) as u64;

    (bits * 1_000_000 / params.bit_rate_bps.max(1) as u64) as u32
}
