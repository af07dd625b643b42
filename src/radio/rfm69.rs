//! RFM69 FSK driver
//!
//! Implements the FskRadio trait using dependency injection for SPI, GPIO
//! pins and the delay source. Uses the SpiBus trait with manual NSS control.

use crate::radio::regs::{self, irq, mode, reg, MAX_PACKET_LEN, WRITE_ACCESS};
use crate::radio::traits::{DataShaping, FskParams, FskRadio, RadioError, MAX_SYNC_WORD_LEN};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiBus;

/// Poll interval while waiting on IRQ flags
const POLL_INTERVAL_US: u32 = 100;

/// Mode switches complete well inside this many polls (100 ms)
const MODE_READY_POLLS: u32 = 1000;

/// Margin added to the transmit timeout
const TX_TIMEOUT_MARGIN_US: u32 = 10_000;

/// Control pins for the RFM69
pub struct Rfm69Pins<Nss, Rst> {
    pub nss: Nss,
    pub reset: Rst,
}

/// RFM69 FSK driver
pub struct Rfm69Driver<Spi, Nss, Rst, D>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Rst: OutputPin,
    D: DelayNs,
{
    spi: Spi,
    nss: Nss,
    reset: Rst,
    delay: D,
    params: Option<FskParams>,
    fixed_length: Option<u8>,
    sync_len: usize,
}

impl<Spi, Nss, Rst, D> Rfm69Driver<Spi, Nss, Rst, D>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Rst: OutputPin,
    D: DelayNs,
{
    /// Create a new RFM69 driver
    pub fn new(spi: Spi, pins: Rfm69Pins<Nss, Rst>, delay: D) -> Self {
        Self {
            spi,
            nss: pins.nss,
            reset: pins.reset,
            delay,
            params: None,
            fixed_length: None,
            // Until a sync word is set, budget for the longest one
            sync_len: MAX_SYNC_WORD_LEN,
        }
    }

    /// Reset the radio (RESET is active high)
    async fn reset(&mut self) {
        let _ = self.reset.set_high();
        self.delay.delay_us(100).await;
        let _ = self.reset.set_low();
        self.delay.delay_ms(5).await;
    }

    /// Write consecutive registers starting at `addr`
    async fn write_registers(&mut self, addr: u8, values: &[u8]) -> Result<(), RadioError> {
        let mut buf = [0u8; 1 + MAX_PACKET_LEN];
        let len = values.len().min(MAX_PACKET_LEN);
        buf[0] = WRITE_ACCESS | addr;
        buf[1..1 + len].copy_from_slice(&values[..len]);

        let _ = self.nss.set_low();
        let result = self.spi.write(&buf[..1 + len]).await;
        let flushed = self.spi.flush().await;
        let _ = self.nss.set_high();

        result.and(flushed).map_err(|_| RadioError::SpiError)
    }

    async fn write_register(&mut self, addr: u8, value: u8) -> Result<(), RadioError> {
        self.write_registers(addr, &[value]).await
    }

    async fn read_register(&mut self, addr: u8) -> Result<u8, RadioError> {
        let tx_buf = [addr & !WRITE_ACCESS, 0x00];
        let mut rx_buf = [0u8; 2];

        let _ = self.nss.set_low();
        let result = self.spi.transfer(&mut rx_buf, &tx_buf).await;
        let flushed = self.spi.flush().await;
        let _ = self.nss.set_high();

        result.and(flushed).map_err(|_| RadioError::SpiError)?;
        Ok(rx_buf[1])
    }

    /// Switch operating mode without waiting for it to settle
    async fn enter_mode(&mut self, op_mode: u8) -> Result<(), RadioError> {
        self.write_register(reg::OP_MODE, op_mode).await
    }

    /// Switch operating mode and wait for ModeReady
    async fn set_mode(&mut self, op_mode: u8) -> Result<(), RadioError> {
        self.enter_mode(op_mode).await?;
        for _ in 0..MODE_READY_POLLS {
            if self.read_register(reg::IRQ_FLAGS1).await? & irq::MODE_READY != 0 {
                return Ok(());
            }
            self.delay.delay_us(POLL_INTERVAL_US).await;
        }
        Err(RadioError::ModeTimeout)
    }

    async fn clear_fifo(&mut self) -> Result<(), RadioError> {
        self.write_register(reg::IRQ_FLAGS2, irq::FIFO_OVERRUN).await
    }

    fn params(&self) -> Result<&FskParams, RadioError> {
        self.params.as_ref().ok_or(RadioError::NotInitialised)
    }

    /// Wait for PacketSent, giving up after `timeout_us`
    async fn wait_packet_sent(&mut self, timeout_us: u32) -> Result<(), RadioError> {
        let polls = timeout_us / POLL_INTERVAL_US + 1;
        for _ in 0..polls {
            if self.read_register(reg::IRQ_FLAGS2).await? & irq::PACKET_SENT != 0 {
                return Ok(());
            }
            self.delay.delay_us(POLL_INTERVAL_US).await;
        }
        Err(RadioError::TxTimeout)
    }
}

impl<Spi, Nss, Rst, D> FskRadio for Rfm69Driver<Spi, Nss, Rst, D>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Rst: OutputPin,
    D: DelayNs,
{
    async fn init(&mut self, params: &FskParams) -> Result<(), RadioError> {
        // Validate everything before touching the chip
        let frf = regs::frf(params.frequency_hz)?;
        let bitrate = regs::bitrate(params.bit_rate_bps)?;
        let fdev = regs::fdev(params.deviation_hz, params.bit_rate_bps)?;
        let rx_bw = regs::rx_bw(params.rx_bandwidth_hz)?;
        let pa = regs::pa_settings(params.tx_power_dbm, params.high_power)?;
        let preamble = regs::preamble_bytes(params.preamble_bits)?;

        self.params = None;
        self.fixed_length = None;
        self.reset().await;

        let version = self.read_register(reg::VERSION).await?;
        if version != regs::CHIP_VERSION {
            log::debug!("RFM69: unexpected version 0x{:02X}", version);
            return Err(RadioError::ChipNotFound);
        }

        self.set_mode(mode::STANDBY).await?;

        self.write_register(reg::DATA_MODUL, regs::data_modul(DataShaping::None))
            .await?;
        self.write_registers(reg::FRF_MSB, &frf.to_be_bytes()[1..]).await?;
        self.write_registers(reg::BITRATE_MSB, &bitrate.to_be_bytes())
            .await?;
        self.write_registers(reg::FDEV_MSB, &fdev.to_be_bytes()).await?;
        self.write_register(reg::RX_BW, rx_bw).await?;

        self.write_register(reg::PA_LEVEL, pa.pa_level).await?;
        self.write_register(reg::OCP, pa.ocp).await?;
        self.write_register(reg::TEST_PA1, pa.test_pa1).await?;
        self.write_register(reg::TEST_PA2, pa.test_pa2).await?;

        self.write_registers(reg::PREAMBLE_MSB, &preamble.to_be_bytes())
            .await?;
        self.write_register(reg::PACKET_CONFIG1, regs::packet_config1(false, params.radio_crc))
            .await?;
        self.write_register(reg::FIFO_THRESH, regs::FIFO_THRESH_TX_ON_NOT_EMPTY)
            .await?;

        self.params = Some(params.clone());
        log::debug!("RFM69: configured for {} Hz", params.frequency_hz);
        Ok(())
    }

    async fn set_fixed_packet_length(&mut self, len: u8) -> Result<(), RadioError> {
        let radio_crc = self.params()?.radio_crc;
        if len == 0 || len as usize > MAX_PACKET_LEN {
            return Err(RadioError::InvalidPacketLength);
        }

        self.write_register(reg::PACKET_CONFIG1, regs::packet_config1(true, radio_crc))
            .await?;
        self.write_register(reg::PAYLOAD_LENGTH, len).await?;
        self.fixed_length = Some(len);
        Ok(())
    }

    async fn set_sync_word(&mut self, sync: &[u8]) -> Result<(), RadioError> {
        self.params()?;
        let config = regs::sync_config(sync)?;

        self.write_register(reg::SYNC_CONFIG, config).await?;
        self.write_registers(reg::SYNC_VALUE1, sync).await?;
        self.sync_len = sync.len();
        Ok(())
    }

    async fn set_data_shaping(&mut self, shaping: DataShaping) -> Result<(), RadioError> {
        self.params()?;
        self.write_register(reg::DATA_MODUL, regs::data_modul(shaping))
            .await
    }

    async fn transmit(&mut self, data: &[u8]) -> Result<(), RadioError> {
        let params = self.params()?;

        let length_ok = match self.fixed_length {
            Some(len) => data.len() == len as usize,
            None => !data.is_empty() && data.len() < MAX_PACKET_LEN,
        };
        if !length_ok {
            return Err(RadioError::InvalidPacketLength);
        }

        let fixed = self.fixed_length.is_some();
        let time_on_air = regs::time_on_air_us(params, self.sync_len, data.len(), fixed);
        let timeout_us = time_on_air.saturating_mul(5).saturating_add(TX_TIMEOUT_MARGIN_US);

        self.set_mode(mode::STANDBY).await?;
        self.clear_fifo().await?;

        if fixed {
            self.write_registers(reg::FIFO, data).await?;
        } else {
            // Variable length frames carry a length byte first
            let mut frame = [0u8; MAX_PACKET_LEN];
            frame[0] = data.len() as u8;
            frame[1..1 + data.len()].copy_from_slice(data);
            self.write_registers(reg::FIFO, &frame[..1 + data.len()])
                .await?;
        }

        self.enter_mode(mode::TX).await?;
        let sent = self.wait_packet_sent(timeout_us).await;

        // Always leave TX, even after a timeout
        self.set_mode(mode::STANDBY).await?;
        sent
    }
}

#[cfg(test)]
pub mod mock {
    //! Register-level RFM69 emulation on a mock SPI bus

    use super::*;
    use core::convert::Infallible;
    use embedded_hal_async::spi::ErrorType;
    use heapless::Vec;

    /// Mock SPI bus emulating the RFM69 register file
    pub struct MockSpiBus {
        regs: [u8; 0x80],
        fifo: Vec<u8, 66>,
        /// Register writes in order, excluding FIFO data
        writes: Vec<(u8, u8), 256>,
        /// Frames that reached the air
        sent: Vec<Vec<u8, 66>, 8>,
        /// Never raise PacketSent
        pub stall_tx: bool,
    }

    impl MockSpiBus {
        pub fn new() -> Self {
            let mut regs = [0u8; 0x80];
            regs[reg::VERSION as usize] = regs::CHIP_VERSION;
            Self {
                regs,
                fifo: Vec::new(),
                writes: Vec::new(),
                sent: Vec::new(),
                stall_tx: false,
            }
        }

        /// Mock a bus with no chip present (reads float high)
        pub fn absent() -> Self {
            let mut bus = Self::new();
            bus.regs = [0xFF; 0x80];
            bus
        }

        pub fn register(&self, addr: u8) -> u8 {
            self.regs[addr as usize]
        }

        pub fn writes(&self) -> &[(u8, u8)] {
            &self.writes
        }

        pub fn sent(&self) -> &[Vec<u8, 66>] {
            &self.sent
        }

        fn write_register(&mut self, addr: u8, value: u8) {
            let _ = self.writes.push((addr, value));
            match addr {
                reg::OP_MODE => {
                    self.regs[addr as usize] = value;
                    self.regs[reg::IRQ_FLAGS1 as usize] |= irq::MODE_READY;
                    match value & mode::MASK {
                        mode::TX if !self.stall_tx && !self.fifo.is_empty() => {
                            let frame = core::mem::replace(&mut self.fifo, Vec::new());
                            let _ = self.sent.push(frame);
                            self.regs[reg::IRQ_FLAGS2 as usize] |= irq::PACKET_SENT;
                        }
                        mode::STANDBY => {
                            self.regs[reg::IRQ_FLAGS2 as usize] &= !irq::PACKET_SENT;
                        }
                        _ => {}
                    }
                }
                reg::IRQ_FLAGS2 => {
                    if value & irq::FIFO_OVERRUN != 0 {
                        self.fifo.clear();
                    }
                }
                _ => self.regs[addr as usize] = value,
            }
        }
    }

    impl Default for MockSpiBus {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ErrorType for MockSpiBus {
        type Error = Infallible;
    }

    impl SpiBus for MockSpiBus {
        async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            words.fill(0);
            Ok(())
        }

        async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            let Some((&first, data)) = words.split_first() else {
                return Ok(());
            };
            let addr = first & !WRITE_ACCESS;
            if first & WRITE_ACCESS == 0 {
                return Ok(());
            }

            if addr == reg::FIFO {
                let _ = self.fifo.extend_from_slice(data);
            } else {
                for (offset, &value) in data.iter().enumerate() {
                    self.write_register(addr + offset as u8, value);
                }
            }
            Ok(())
        }

        async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            let addr = write.first().copied().unwrap_or(0) & !WRITE_ACCESS;
            for (offset, byte) in read.iter_mut().enumerate() {
                *byte = match offset {
                    0 => 0,
                    n => self.regs[(addr as usize + n - 1) % 0x80],
                };
            }
            Ok(())
        }

        async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            let write: Vec<u8, 66> = Vec::from_slice(words).unwrap_or_default();
            self.transfer(words, &write).await
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::beacon::indicator::mock::{MockDelay, NullPin};
        use crate::radio::traits::{configure, RadioConfig};
        use core::cell::Cell;

        type TestDriver<'a> = Rfm69Driver<MockSpiBus, NullPin, NullPin, MockDelay<'a>>;

        fn driver(bus: MockSpiBus, clock: &Cell<u64>) -> TestDriver<'_> {
            let pins = Rfm69Pins {
                nss: NullPin,
                reset: NullPin,
            };
            Rfm69Driver::new(bus, pins, MockDelay::new(clock))
        }

        #[test]
        fn test_init_writes_modulation_registers() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                radio.init(&FskParams::default()).await.unwrap();
            });

            let bus = &radio.spi;
            assert_eq!(bus.register(reg::FRF_MSB), 0x6C);
            assert_eq!(bus.register(reg::FRF_MID), 0x80);
            assert_eq!(bus.register(reg::FRF_LSB), 0x00);
            assert_eq!(bus.register(reg::BITRATE_MSB), 0x05);
            assert_eq!(bus.register(reg::BITRATE_LSB), 0x00);
            assert_eq!(bus.register(reg::FDEV_MSB), 0x01);
            assert_eq!(bus.register(reg::FDEV_LSB), 0x99);
            assert_eq!(bus.register(reg::RX_BW), 0x4B);
            assert_eq!(bus.register(reg::PA_LEVEL), 0x97);
            assert_eq!(bus.register(reg::PREAMBLE_MSB), 0x00);
            assert_eq!(bus.register(reg::PREAMBLE_LSB), 0x03);
            assert_eq!(bus.register(reg::PACKET_CONFIG1), 0x90);
            assert_eq!(bus.register(reg::OP_MODE), mode::STANDBY);
        }

        #[test]
        fn test_init_without_chip() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::absent(), &clock);

            futures::executor::block_on(async {
                let result = radio.init(&FskParams::default()).await;
                assert_eq!(result, Err(RadioError::ChipNotFound));

                // Nothing else works until init succeeds
                assert_eq!(
                    radio.transmit(&[1, 2, 3, 4, 5]).await,
                    Err(RadioError::NotInitialised)
                );
            });
        }

        #[test]
        fn test_invalid_params_rejected_before_reset() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);
            let params = FskParams {
                preamble_bits: 20,
                ..FskParams::default()
            };

            futures::executor::block_on(async {
                assert_eq!(
                    radio.init(&params).await,
                    Err(RadioError::InvalidPreambleLength)
                );
            });

            assert!(radio.spi.writes().is_empty());
            assert_eq!(clock.get(), 0);
        }

        #[test]
        fn test_full_configuration() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                configure(&mut radio, &RadioConfig::default()).await.unwrap();
            });

            let bus = &radio.spi;
            assert_eq!(bus.register(reg::PACKET_CONFIG1), 0x10);
            assert_eq!(bus.register(reg::PAYLOAD_LENGTH), 5);
            assert_eq!(bus.register(reg::SYNC_CONFIG), 0x88);
            assert_eq!(bus.register(reg::SYNC_VALUE1), 0xD3);
            assert_eq!(bus.register(reg::SYNC_VALUE1 + 1), 0x91);
            assert_eq!(bus.register(reg::DATA_MODUL), 0x00);
        }

        #[test]
        fn test_configuration_before_init() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                assert_eq!(
                    radio.set_fixed_packet_length(5).await,
                    Err(RadioError::NotInitialised)
                );
                assert_eq!(
                    radio.set_sync_word(&[0xD3, 0x91]).await,
                    Err(RadioError::NotInitialised)
                );
            });
        }

        #[test]
        fn test_sync_word_rejects_zero_bytes() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                radio.init(&FskParams::default()).await.unwrap();
                assert_eq!(
                    radio.set_sync_word(&[0xD3, 0x00]).await,
                    Err(RadioError::InvalidSyncWord)
                );
            });
        }

        #[test]
        fn test_data_shaping() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                radio.init(&FskParams::default()).await.unwrap();
                radio
                    .set_data_shaping(DataShaping::Gaussian0_5)
                    .await
                    .unwrap();
            });

            assert_eq!(radio.spi.register(reg::DATA_MODUL), 0x02);
        }

        #[test]
        fn test_transmit_fixed_length() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);
            let packet = [0x78, 0x55, 0x4C, 0x33, 0x58];

            futures::executor::block_on(async {
                configure(&mut radio, &RadioConfig::default()).await.unwrap();
                radio.transmit(&packet).await.unwrap();
                radio.transmit(&packet).await.unwrap();
            });

            let sent = radio.spi.sent();
            assert_eq!(sent.len(), 2);
            assert_eq!(sent[0].as_slice(), &packet);
            assert_eq!(sent[1].as_slice(), &packet);
            assert_eq!(radio.spi.register(reg::OP_MODE), mode::STANDBY);
        }

        #[test]
        fn test_transmit_wrong_length() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                configure(&mut radio, &RadioConfig::default()).await.unwrap();
                assert_eq!(
                    radio.transmit(&[0x01, 0x02]).await,
                    Err(RadioError::InvalidPacketLength)
                );
            });

            assert!(radio.spi.sent().is_empty());
        }

        #[test]
        fn test_transmit_variable_length_prefix() {
            let clock = Cell::new(0);
            let mut radio = driver(MockSpiBus::new(), &clock);

            futures::executor::block_on(async {
                radio.init(&FskParams::default()).await.unwrap();
                radio.transmit(&[0xAA, 0xBB]).await.unwrap();
            });

            assert_eq!(radio.spi.sent()[0].as_slice(), &[0x02, 0xAA, 0xBB]);
        }

        #[test]
        fn test_transmit_timeout_returns_to_standby() {
            let clock = Cell::new(0);
            let mut bus = MockSpiBus::new();
            bus.stall_tx = true;
            let mut radio = driver(bus, &clock);

            futures::executor::block_on(async {
                configure(&mut radio, &RadioConfig::default()).await.unwrap();
                let before = clock.get();
                assert_eq!(
                    radio.transmit(&[1, 2, 3, 4, 5]).await,
                    Err(RadioError::TxTimeout)
                );
                // 5x the 3.84 ms frame plus margin, in 100 us polls
                assert!(clock.get() - before >= 29_200_000);
            });

            assert_eq!(radio.spi.register(reg::OP_MODE), mode::STANDBY);
        }
    }
}
