//! Hardware and beacon configuration constants for the ESP32-S3 with an RFM69 module

/// Status LED pin
pub mod led {
    pub const PIN: u8 = 48;

    /// The on-board LED is wired active low
    pub const ACTIVE_LOW: bool = true;
}

/// SPI pins for the radio module
pub mod spi {
    pub const SCLK: u8 = 7;
    pub const MISO: u8 = 8;
    pub const MOSI: u8 = 9;

    pub const FREQUENCY_MHZ: u32 = 1;
}

/// RFM69 control pins
pub mod radio_pins {
    pub const NSS: u8 = 41;
    pub const RESET: u8 = 42;
}

/// Default FSK link configuration, matching what deployed receivers listen for
pub mod radio_defaults {
    pub const FREQUENCY_HZ: u32 = 434_000_000;
    pub const BIT_RATE_BPS: u32 = 25_000;
    pub const DEVIATION_HZ: u32 = 25_000;
    pub const RX_BANDWIDTH_HZ: u32 = 50_000;
    /// Output power in dBm, -18..=13 on the standard module
    pub const TX_POWER_DBM: i8 = 5;
    /// Longer than deployed tags use
    pub const PREAMBLE_BITS: u16 = 24;
    pub const SYNC_WORD: [u8; 2] = [0xD3, 0x91];
    /// Set for RFM69HW/HCW modules (PA1/PA2 output stage)
    pub const HIGH_POWER: bool = false;
    /// Hardware CRC appended by the radio after the payload
    pub const RADIO_CRC: bool = true;
}

/// Tag identity defaults
pub mod tag {
    /// Literal 32-bit identifier. Set to `None` to fall back to the encoded id.
    pub const DEFAULT_ID: Option<u32> = Some(0x7855_4C33);

    /// 20-bit identifier run through the encoding table when no literal id is configured
    pub const DEFAULT_ENCODED_ID: u32 = 0x1_2345;

    /// Identifier bytes plus checksum
    pub const PACKET_LEN: usize = 5;
}

/// Indicator timings
pub mod indicator {
    /// LED on-time after a successful transmission
    pub const TX_PULSE_MS: u32 = 100;

    /// Half period of the failure and fault blink
    pub const BLINK_HALF_PERIOD_MS: u32 = 50;

    /// Number of blinks after a failed transmission
    pub const FAILURE_BLINKS: u8 = 10;
}

/// Beacon pacing
pub mod beacon {
    /// Nominal transmit interval. Not applied unless interval pacing is selected.
    pub const TX_INTERVAL_MS: u32 = 2000;
}

/// Serial console logging
pub mod logging {
    use log::LevelFilter;

    pub const LEVEL: LevelFilter = LevelFilter::Info;

    /// Maximum length of a single log line
    pub const MAX_LINE_LEN: usize = 128;
}
