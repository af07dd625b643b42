//! Beacon state machine
//!
//! Configures the radio once, then sends the same packet forever. A
//! successful transmission flashes the LED once; a failed one blinks it
//! rapidly and the next attempt follows straight away. If the radio cannot
//! be configured the beacon parks in `Fault` and blinks until reset.

use crate::beacon::indicator::{Indicator, Polarity};
use crate::config::{beacon, led};
use crate::radio::traits::{configure, FskRadio, RadioConfig, RadioError};
use crate::tag::{ConfigError, Packet, TagId};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

/// Beacon lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    /// Radio not yet configured
    Initializing,
    /// Radio configured, nothing sent yet
    Ready,
    /// Transmission in progress
    Transmitting,
    /// Between transmissions
    IdleWait,
    /// Radio configuration failed. Never left.
    Fault(RadioError),
}

/// Spacing between transmissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Start the next transmission as soon as the previous one returns
    #[default]
    BackToBack,
    /// Start transmissions `period_ms` apart, counting LED feedback time
    Interval { period_ms: u32 },
}

impl Pacing {
    /// Interval pacing at the nominal build-time transmit interval
    pub fn nominal() -> Self {
        Self::Interval {
            period_ms: beacon::TX_INTERVAL_MS,
        }
    }

    /// Time left to wait after `spent_ms` of feedback
    fn remaining_ms(&self, spent_ms: u32) -> u32 {
        match *self {
            Self::BackToBack => 0,
            Self::Interval { period_ms } => period_ms.saturating_sub(spent_ms),
        }
    }
}

/// Everything the beacon needs to know at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconSettings {
    pub tag: TagId,
    pub radio: RadioConfig,
    pub pacing: Pacing,
    pub polarity: Polarity,
}

impl BeaconSettings {
    /// Build settings from optional identifier overrides
    ///
    /// `fixed` is a literal 32-bit id, `encoded` a 20-bit id; both hexadecimal.
    pub fn from_env_strs(fixed: Option<&str>, encoded: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            tag: TagId::resolve(fixed, encoded)?,
            ..Self::default()
        })
    }
}

impl Default for BeaconSettings {
    fn default() -> Self {
        Self {
            tag: TagId::default(),
            radio: RadioConfig::default(),
            pacing: Pacing::default(),
            polarity: Polarity::from_active_low(led::ACTIVE_LOW),
        }
    }
}

/// Test beacon
pub struct Beacon<R, P, D>
where
    R: FskRadio,
    P: OutputPin,
    D: DelayNs,
{
    radio: R,
    indicator: Indicator<P>,
    delay: D,
    packet: Packet,
    radio_config: RadioConfig,
    pacing: Pacing,
    state: BeaconState,
}

impl<R, P, D> Beacon<R, P, D>
where
    R: FskRadio,
    P: OutputPin,
    D: DelayNs,
{
    /// Create a beacon. The packet is built here and never changes.
    pub fn new(radio: R, led: P, delay: D, settings: BeaconSettings) -> Self {
        Self {
            radio,
            indicator: Indicator::new(led, settings.polarity),
            delay,
            packet: Packet::from_tag(settings.tag),
            radio_config: settings.radio,
            pacing: settings.pacing,
            state: BeaconState::Initializing,
        }
    }

    pub fn state(&self) -> BeaconState {
        self.state
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Announce the packet and configure the radio
    ///
    /// Only acts from `Initializing`; in any other state it returns the
    /// current state unchanged.
    pub async fn start(&mut self) -> BeaconState {
        if self.state != BeaconState::Initializing {
            return self.state;
        }

        self.indicator.on();
        info!("CTT test tag {}", self.packet);

        self.state = match configure(&mut self.radio, &self.radio_config).await {
            Ok(()) => {
                info!("Radio initialised");
                BeaconState::Ready
            }
            Err(e) => {
                error!("Radio init failed: {:?}", e);
                BeaconState::Fault(e)
            }
        };
        self.state
    }

    /// Send the packet once, with LED feedback
    ///
    /// Returns the time spent on feedback in milliseconds alongside the result.
    /// Before the radio is configured, or in `Fault`, nothing is sent and
    /// `NotInitialised` or the fault error is returned.
    pub async fn transmit_once(&mut self) -> (Result<(), RadioError>, u32) {
        match self.state {
            BeaconState::Initializing => return (Err(RadioError::NotInitialised), 0),
            BeaconState::Fault(e) => return (Err(e), 0),
            BeaconState::Ready | BeaconState::Transmitting | BeaconState::IdleWait => {}
        }

        self.state = BeaconState::Transmitting;
        let result = self.radio.transmit(self.packet.as_bytes()).await;

        let spent = match result {
            Ok(()) => {
                info!("TX done");
                self.indicator.tx_pulse(&mut self.delay).await
            }
            Err(e) => {
                warn!("TX failed: {:?}", e);
                self.indicator.failure_blink(&mut self.delay).await
            }
        };
        (result, spent)
    }

    /// Run one iteration of the beacon loop
    ///
    /// In `Fault` this blinks once and returns, so callers decide how long
    /// to keep going.
    pub async fn step(&mut self) -> BeaconState {
        match self.state {
            BeaconState::Initializing => self.start().await,
            BeaconState::Fault(_) => {
                self.indicator.blink(&mut self.delay).await;
                self.state
            }
            BeaconState::Ready | BeaconState::Transmitting | BeaconState::IdleWait => {
                let (_, spent) = self.transmit_once().await;
                self.state = BeaconState::IdleWait;

                let wait_ms = self.pacing.remaining_ms(spent);
                if wait_ms > 0 {
                    self.delay.delay_ms(wait_ms).await;
                }
                self.state
            }
        }
    }

    /// Run the beacon until power loss or reset
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }
}

/// Blink the fault pattern forever
///
/// Used when the beacon cannot even be built, e.g. on a bad identifier.
pub async fn fault_forever<P: OutputPin, D: DelayNs>(indicator: &mut Indicator<P>, delay: &mut D) {
    loop {
        indicator.blink(delay).await;
    }
}
