#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_time::Delay;
use esp_backtrace as _;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::Async;
use static_cell::StaticCell;

use tag_beacon_firmware::beacon::{fault_forever, Beacon, BeaconSettings, Indicator, Polarity};
use tag_beacon_firmware::config;
use tag_beacon_firmware::logger;
use tag_beacon_firmware::radio::{Rfm69Driver, Rfm69Pins};

/// Type alias for the concrete radio driver
type RadioDriver = Rfm69Driver<Spi<'static, Async>, Output<'static>, Output<'static>, Delay>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());

    // LED off until the beacon starts (active low)
    let led = Output::new(peripherals.GPIO48, Level::High, OutputConfig::default());

    // Logging is best effort; a second init is the only failure
    let _ = logger::init(config::logging::LEVEL);

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Configure SPI for the radio
    let sclk = peripherals.GPIO7;
    let miso = peripherals.GPIO8;
    let mosi = peripherals.GPIO9;

    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(config::spi::FREQUENCY_MHZ))
            .with_mode(SpiMode::_0),
    )
    .expect("Failed to configure SPI")
    .with_sck(sclk)
    .with_miso(miso)
    .with_mosi(mosi)
    .into_async();

    // Configure radio control pins (NSS idle high, RESET idle low)
    let nss = Output::new(peripherals.GPIO41, Level::High, OutputConfig::default());
    let reset = Output::new(peripherals.GPIO42, Level::Low, OutputConfig::default());

    let radio = Rfm69Driver::new(spi, Rfm69Pins { nss, reset }, Delay);

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(beacon_task(radio, led));
    })
}

/// Task that runs the beacon forever
///
/// The tag identity may be overridden at build time with `TAG_ID` (literal
/// 32-bit id) or `TAG_ID20` (20-bit encoded id), both hexadecimal.
#[embassy_executor::task]
async fn beacon_task(radio: RadioDriver, led: Output<'static>) {
    match BeaconSettings::from_env_strs(option_env!("TAG_ID"), option_env!("TAG_ID20")) {
        Ok(settings) => {
            let mut beacon = Beacon::new(radio, led, Delay, settings);
            beacon.run().await;
        }
        Err(e) => {
            log::error!("Invalid tag identifier: {:?}", e);
            let mut indicator = Indicator::new(led, Polarity::from_active_low(config::led::ACTIVE_LOW));
            fault_forever(&mut indicator, &mut Delay).await;
        }
    }
}
