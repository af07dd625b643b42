//! Status indicator
//!
//! Wraps the LED pin so the beacon can talk in terms of on/off regardless of
//! how the LED is wired. Pin errors are ignored: the LED is feedback only.

use crate::config::indicator::{BLINK_HALF_PERIOD_MS, FAILURE_BLINKS, TX_PULSE_MS};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

/// LED wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pin high turns the LED on
    ActiveHigh,
    /// Pin low turns the LED on
    ActiveLow,
}

impl Polarity {
    pub fn from_active_low(active_low: bool) -> Self {
        if active_low {
            Self::ActiveLow
        } else {
            Self::ActiveHigh
        }
    }
}

/// Status LED
pub struct Indicator<P: OutputPin> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> Indicator<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Turn the LED on
    pub fn on(&mut self) {
        let _ = match self.polarity {
            Polarity::ActiveHigh => self.pin.set_high(),
            Polarity::ActiveLow => self.pin.set_low(),
        };
    }

    /// Turn the LED off
    pub fn off(&mut self) {
        let _ = match self.polarity {
            Polarity::ActiveHigh => self.pin.set_low(),
            Polarity::ActiveLow => self.pin.set_high(),
        };
    }

    /// Single short flash after a successful transmission
    ///
    /// Leaves the LED off. Returns the time spent in milliseconds.
    pub async fn tx_pulse<D: DelayNs>(&mut self, delay: &mut D) -> u32 {
        self.on();
        delay.delay_ms(TX_PULSE_MS).await;
        self.off();
        TX_PULSE_MS
    }

    /// One off/on blink cycle, leaving the LED on
    ///
    /// Returns the time spent in milliseconds.
    pub async fn blink<D: DelayNs>(&mut self, delay: &mut D) -> u32 {
        self.off();
        delay.delay_ms(BLINK_HALF_PERIOD_MS).await;
        self.on();
        delay.delay_ms(BLINK_HALF_PERIOD_MS).await;
        2 * BLINK_HALF_PERIOD_MS
    }

    /// Rapid blink after a failed transmission
    ///
    /// Returns the time spent in milliseconds.
    pub async fn failure_blink<D: DelayNs>(&mut self, delay: &mut D) -> u32 {
        let mut spent = 0;
        for _ in 0..FAILURE_BLINKS {
            spent += self.blink(delay).await;
        }
        spent
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock pin and delay for testing

    use core::cell::{Cell, RefCell};
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, OutputPin};
    use embedded_hal_async::delay::DelayNs;
    use heapless::Vec;

    /// Recorded pin levels, `true` for high
    pub type PinLog = RefCell<Vec<bool, 512>>;

    /// Output pin that records every level written
    pub struct MockPin<'a> {
        log: &'a PinLog,
    }

    impl<'a> MockPin<'a> {
        pub fn new(log: &'a PinLog) -> Self {
            Self { log }
        }
    }

    impl ErrorType for MockPin<'_> {
        type Error = Infallible;
    }

    impl OutputPin for MockPin<'_> {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            let _ = self.log.borrow_mut().push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            let _ = self.log.borrow_mut().push(true);
            Ok(())
        }
    }

    /// Output pin that discards writes
    pub struct NullPin;

    impl ErrorType for NullPin {
        type Error = Infallible;
    }

    impl OutputPin for NullPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    /// Delay that returns immediately and accumulates the requested time
    pub struct MockDelay<'a> {
        elapsed_ns: &'a Cell<u64>,
    }

    impl<'a> MockDelay<'a> {
        pub fn new(elapsed_ns: &'a Cell<u64>) -> Self {
            Self { elapsed_ns }
        }
    }

    impl DelayNs for MockDelay<'_> {
        async fn delay_ns(&mut self, ns: u32) {
            self.elapsed_ns.set(self.elapsed_ns.get() + ns as u64);
        }
    }

    /// Count the writes of `level`
    pub fn count_level(log: &PinLog, level: bool) -> usize {
        log.borrow().iter().filter(|&&written| written == level).count()
    }
}
