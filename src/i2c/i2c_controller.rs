// Licensed under the Apache-2.0 license

//! embedded-hal adapter.
//!
//! [`I2cController`] exposes any [`I2cMaster`] implementation through
//! `embedded_hal::i2c::I2c`, so drivers written against embedded-hal can
//! run on a Kinetis bus.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::I2cConfig;
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub config: I2cConfig,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, config: I2cConfig, logger: L) -> Self {
        Self {
            hardware,
            config,
            logger,
        }
    }

    /// Programs the hardware from the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns the hardware's initialization error.
    pub fn init(&mut self) -> Result<(), H::Error> {
        self.hardware.init(&self.config).inspect_err(|error| {
            crate::log_error!(self.logger, "i2c init failed: {:?}", error);
        })
    }

    /// Clears a stuck bus.
    ///
    /// # Errors
    ///
    /// Returns the hardware's recovery error.
    pub fn recover(&mut self) -> Result<(), H::Error> {
        crate::log_debug!(self.logger, "i2c bus recovery");
        self.hardware.recover_bus()
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware.read(addr, buffer)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware.write(addr, bytes)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware.write_read(addr, bytes, buffer)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware.transaction_slice(addr, operations)
    }
}
