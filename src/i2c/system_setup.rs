// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! Clock gating and clock queries for the I2C peripherals, expressed through
//! the `OpenProt` `SystemControl` trait so the driver never touches the
//! system integration module directly.

use crate::i2c::common::{BusId, Error};
use openprot_hal_blocking::system_control::SystemControl;

/// Clocks the I2C driver needs from the system controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClockId {
    /// SCGC4 gate for I2C0.
    I2c0Gate,
    /// SCGC4 gate for I2C1.
    I2c1Gate,
    /// Peripheral bus clock, the usual divider source.
    BusClock,
    /// Core clock, the divider source for bus 1 on the LC.
    CoreClock,
}

impl ClockId {
    #[must_use]
    pub const fn gate(bus: BusId) -> Self {
        match bus {
            BusId::I2c0 => ClockId::I2c0Gate,
            BusId::I2c1 => ClockId::I2c1Gate,
        }
    }
}

/// Reset identifiers of the system controller the driver is typed over.
///
/// Kinetis parts have no per-peripheral reset line and the driver never asks
/// for one; a wedged bus is cleared by clocking SCL instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResetId {
    I2c0,
    I2c1,
}

/// Helper for I2C system control operations
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Gates on the peripheral clock of `bus`.
    ///
    /// # Errors
    ///
    /// Returns `Error::SystemControl` if the system controller rejects the request.
    pub fn initialize_i2c_system<S>(system_controller: &mut S, bus: BusId) -> Result<(), Error>
    where
        S: SystemControl<ClockId = ClockId, ResetId = ResetId>,
    {
        system_controller
            .enable(&ClockId::gate(bus))
            .map_err(|_| Error::SystemControl)
    }

    /// Frequency of `clock` in Hz, used to select the divider table.
    ///
    /// # Errors
    ///
    /// Returns `Error::SystemControl` if the frequency is unavailable or does
    /// not fit in 32 bits.
    pub fn get_i2c_source_frequency<S>(system_controller: &S, clock: ClockId) -> Result<u32, Error>
    where
        S: SystemControl<ClockId = ClockId, ResetId = ResetId>,
    {
        let hz = system_controller
            .get_frequency(&clock)
            .map_err(|_| Error::SystemControl)?;
        u32::try_from(hz).map_err(|_| Error::SystemControl)
    }
}
