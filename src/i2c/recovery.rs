// Licensed under the Apache-2.0 license

//! Stuck-bus recovery.
//!
//! A slave interrupted mid-byte (for example by a master reset) can hold SDA
//! low indefinitely. Clocking SCL by hand lets it finish the byte and release
//! SDA. This assumes a single master: clocking the bus under another active
//! master corrupts its transfer.

use crate::common::Logger;
use crate::i2c::common::{ErrorCounter, I2cStatus};
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::I2cRegisters;
use crate::i2c::traits::{BusPins, Platform};
use embedded_hal::delay::DelayNs;
use proposed_traits::i2c_target::I2CTarget;

/// Enough clocks for a slave to finish any byte and its ACK bit.
const MAX_RECOVERY_CLOCKS: u8 = 9;

/// Half period of the recovery clock, 100 kHz.
const RECOVERY_HALF_PERIOD_US: u32 = 5;

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    KinetisI2c<R, P, E, I2CT, L>
{
    /// Clocks SCL until SDA is released, then hands the pins back to the
    /// peripheral and resets the transfer status.
    pub fn reset_bus(&mut self) {
        let pins = self.current_pins;
        self.pins.release(pins, self.pullup);
        self.pins.drive_scl(pins, true);

        let mut clocks = 0;
        while !self.pins.sda_is_high(pins) && clocks < MAX_RECOVERY_CLOCKS {
            self.pins.drive_scl(pins, false);
            self.platform.delay_us(RECOVERY_HALF_PERIOD_US);
            self.pins.drive_scl(pins, true);
            self.platform.delay_us(RECOVERY_HALF_PERIOD_US);
            clocks += 1;
        }

        self.status.set(I2cStatus::Waiting);
        self.connect_pins(pins, self.pullup);
        self.counters.increment(ErrorCounter::ResetBus);
        crate::log_debug!(
            self.logger,
            "i2c{}: bus reset after {} clocks",
            self.bus.index(),
            clocks
        );
    }
}
