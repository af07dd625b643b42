//! FSK radio trait for abstraction and testability
//!
//! This trait defines the transmit-side interface the beacon needs,
//! allowing the RFM69 driver to be swapped with a mock for testing.

use crate::config::radio_defaults;
use crate::config::tag::PACKET_LEN;
use core::future::Future;
use heapless::Vec;

/// Longest sync word the radio supports
pub const MAX_SYNC_WORD_LEN: usize = 8;

/// Errors that can occur during radio operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Version register did not identify a supported chip
    ChipNotFound,
    /// Radio did not report mode ready in time
    ModeTimeout,
    /// Packet sent flag never raised
    TxTimeout,
    /// SPI communication error
    SpiError,
    /// Radio not initialised
    NotInitialised,
    /// Carrier frequency outside the supported bands
    InvalidFrequency,
    /// Bit rate outside the supported range
    InvalidBitRate,
    /// Frequency deviation outside the supported range
    InvalidDeviation,
    /// Receive bandwidth is not one the radio can select
    InvalidRxBandwidth,
    /// Output power outside the range of the selected PA
    InvalidOutputPower,
    /// Preamble length not a whole number of bytes or too long
    InvalidPreambleLength,
    /// Sync word empty, too long or containing zero bytes
    InvalidSyncWord,
    /// Payload length does not match the packet configuration
    InvalidPacketLength,
}

/// Gaussian filter applied to the FSK modulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataShaping {
    #[default]
    None,
    /// Gaussian filter, BT = 1.0
    Gaussian1_0,
    /// Gaussian filter, BT = 0.5
    Gaussian0_5,
    /// Gaussian filter, BT = 0.3
    Gaussian0_3,
}

/// FSK modulation parameters applied at initialisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FskParams {
    /// Carrier frequency in Hz
    pub frequency_hz: u32,
    /// Bit rate in bits per second
    pub bit_rate_bps: u32,
    /// Frequency deviation in Hz
    pub deviation_hz: u32,
    /// Receive bandwidth in Hz
    pub rx_bandwidth_hz: u32,
    /// Transmit power in dBm
    pub tx_power_dbm: i8,
    /// Preamble length in bits
    pub preamble_bits: u16,
    /// Module has the high power PA1/PA2 output stage
    pub high_power: bool,
    /// Append the radio's own CRC after the payload
    pub radio_crc: bool,
}

impl Default for FskParams {
    fn default() -> Self {
        Self {
            frequency_hz: radio_defaults::FREQUENCY_HZ,
            bit_rate_bps: radio_defaults::BIT_RATE_BPS,
            deviation_hz: radio_defaults::DEVIATION_HZ,
            rx_bandwidth_hz: radio_defaults::RX_BANDWIDTH_HZ,
            tx_power_dbm: radio_defaults::TX_POWER_DBM,
            preamble_bits: radio_defaults::PREAMBLE_BITS,
            high_power: radio_defaults::HIGH_POWER,
            radio_crc: radio_defaults::RADIO_CRC,
        }
    }
}

/// Complete link configuration: modulation plus packet framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioConfig {
    pub fsk: FskParams,
    pub sync_word: Vec<u8, MAX_SYNC_WORD_LEN>,
    pub packet_length: u8,
    pub shaping: DataShaping,
}

impl Default for RadioConfig {
    fn default() -> Self {
        let mut sync_word = Vec::new();
        // The default sync word is shorter than the maximum
        let _ = sync_word.extend_from_slice(&radio_defaults::SYNC_WORD);

        Self {
            fsk: FskParams::default(),
            sync_word,
            packet_length: PACKET_LEN as u8,
            shaping: DataShaping::None,
        }
    }
}

/// Abstract FSK radio interface for testability
///
/// Only the transmit path is needed: the beacon never listens.
pub trait FskRadio {
    /// Initialise the radio hardware with the given modulation
    fn init(&mut self, params: &FskParams) -> impl Future<Output = Result<(), RadioError>>;

    /// Switch to fixed-length packets of `len` bytes
    fn set_fixed_packet_length(&mut self, len: u8) -> impl Future<Output = Result<(), RadioError>>;

    /// Set the sync word sent after the preamble
    fn set_sync_word(&mut self, sync: &[u8]) -> impl Future<Output = Result<(), RadioError>>;

    /// Set the modulation shaping filter
    fn set_data_shaping(&mut self, shaping: DataShaping) -> impl Future<Output = Result<(), RadioError>>;

    /// Transmit a packet
    ///
    /// Blocks until transmission is complete or an error occurs.
    fn transmit(&mut self, data: &[u8]) -> impl Future<Output = Result<(), RadioError>>;
}

/// Apply a full link configuration, stopping at the first failing step
pub async fn configure<R: FskRadio>(radio: &mut R, config: &RadioConfig) -> Result<(), RadioError> {
    radio.init(&config.fsk).await?;
    radio.set_fixed_packet_length(config.packet_length).await?;
    radio.set_sync_word(&config.sync_word).await?;
    radio.set_data_shaping(config.shaping).await?;
    Ok(())
}
