// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! The driver is split along two kinds of seams:
//!
//! - Driver-facing traits ([`I2cHardwareCore`], [`I2cMaster`]) implemented by
//!   the Kinetis bus context and consumed by the embedded-hal adapter.
//! - Collaborator traits ([`BusPins`], [`DmaChannel`], [`DmaAllocator`],
//!   [`MicrosClock`], [`InterruptPriority`]) that the bus context consumes.
//!   Board support code implements them over the real port, DMA and NVIC
//!   hardware; tests implement them over a simulated bus.
//!
//! ```text
//! I2cHardwareCore (foundation)
//!     └── I2cMaster (master operations)
//!
//! Platform = MicrosClock + DelayNs + InterruptPriority + DmaAllocator
//! ```

use crate::i2c::common::{BusId, I2cConfig, PinPair, Pullup};
use crate::i2c::rate::I2cRate;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};
use fugit::MicrosDurationU32;

/// Monotonic microsecond timestamp.
pub type MicrosInstant = fugit::TimerInstantU32<1_000_000>;

/// Core I2C hardware interface.
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Program the peripheral for the role, pins, rate and strategy in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the bus is busy.
    fn init(&mut self, config: &I2cConfig) -> Result<(), Self::Error>;

    /// Program the divider for `rate` and return the rate actually applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is not reachable from the source clock.
    /// The fallback divider has been programmed when this happens.
    fn configure_timing(&mut self, rate: I2cRate) -> Result<I2cRate, Self::Error>;

    /// Handle hardware interrupt events (called from ISR)
    fn handle_interrupt(&mut self);

    /// Attempt to recover the I2C bus from stuck conditions
    ///
    /// # Errors
    ///
    /// Returns an error if bus recovery is not supported by the hardware.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C Master mode operations
///
/// Every operation is blocking. A transaction keeps ownership of the bus
/// between its operations and issues a repeated START for each one.
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write data to a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, bus arbitration
    /// is lost, or other I2C protocol errors occur.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, bus arbitration
    /// is lost, or other I2C protocol errors occur.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Combined write-then-read operation with restart condition
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge during either
    /// the write or read phase, or if bus arbitration is lost.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute a sequence of I2C operations as a single transaction
    ///
    /// # Errors
    ///
    /// Returns the first error. Operations after a failure are not attempted.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

/// Port control for one bus instance's SCL/SDA pins.
pub trait BusPins {
    /// Route the pair to the I2C peripheral with the given pull-up mode.
    fn connect(&mut self, pins: PinPair, pullup: Pullup);

    /// Return the pair to plain digital inputs, pulled up when `pullup` is internal.
    fn release(&mut self, pins: PinPair, pullup: Pullup);

    /// Drive SCL as a push-pull GPIO output.
    fn drive_scl(&mut self, pins: PinPair, high: bool);

    /// Sample SDA as a digital input.
    fn sda_is_high(&self, pins: PinPair) -> bool;

    /// Arm the SDA rising-edge interrupt used for slave STOP detection.
    fn arm_sda_rising(&mut self, pins: PinPair);

    fn disarm_sda_rising(&mut self, pins: PinPair);
}

/// One-shot DMA channel moving bytes between memory and the data register.
///
/// The channel triggers on the peripheral's DMA request, disables itself on
/// completion and raises the bus interrupt when done.
pub trait DmaChannel {
    /// Configure a memory to data register transfer.
    ///
    /// # Safety
    ///
    /// `source` must remain valid for `len` bytes and must not be written
    /// until the transfer completes or the channel is disabled.
    unsafe fn configure_transmit(&mut self, source: *const u8, len: usize, data_register: usize);

    /// Configure a data register to memory transfer.
    ///
    /// # Safety
    ///
    /// `destination` must remain valid for `len` bytes and must not be
    /// accessed until the transfer completes or the channel is disabled.
    unsafe fn configure_receive(&mut self, data_register: usize, destination: *mut u8, len: usize);

    /// Start servicing peripheral requests.
    fn enable(&mut self);
    fn disable(&mut self);

    fn is_complete(&self) -> bool;
    fn clear_complete(&mut self);
    fn clear_interrupt(&mut self);

    fn has_error(&self) -> bool;
    fn clear_error(&mut self);

    /// Bytes not yet moved by the configured transfer.
    fn remaining(&self) -> usize;
}

/// Source of DMA channels.
pub trait DmaAllocator {
    type Channel: DmaChannel;

    /// Claims a channel routed to `bus`'s DMA request, if one is free.
    fn allocate(&mut self, bus: BusId) -> Option<Self::Channel>;

    fn release(&mut self, channel: Self::Channel);
}

/// Monotonic microsecond counter.
pub trait MicrosClock {
    fn now(&self) -> MicrosInstant;

    /// Time since `start`.
    fn elapsed(&self, start: MicrosInstant) -> MicrosDurationU32 {
        self.now()
            .checked_duration_since(start)
            .unwrap_or(MicrosDurationU32::from_ticks(0))
    }

    /// True once `timeout` has passed since `start`. A zero timeout never expires.
    fn expired(&self, start: MicrosInstant, timeout: MicrosDurationU32) -> bool {
        timeout.ticks() != 0 && self.elapsed(start) >= timeout
    }
}

/// Interrupt controller priorities, in the NVIC's encoding.
///
/// Lower values are more urgent. Thread mode reports 256, one step past the
/// least urgent interrupt priority.
pub trait InterruptPriority {
    /// Priority of the code currently executing.
    fn execution_priority(&self) -> u16;

    fn irq_priority(&self, irq: u16) -> u8;

    fn set_irq_priority(&mut self, irq: u16, priority: u8);

    fn enable_irq(&mut self, irq: u16);
}

/// Everything the bus context needs from the surrounding system.
pub trait Platform: MicrosClock + DelayNs + InterruptPriority + DmaAllocator {}

impl<T> Platform for T where T: MicrosClock + DelayNs + InterruptPriority + DmaAllocator {}
