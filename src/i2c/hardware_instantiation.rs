// Licensed under the Apache-2.0 license

//! # Bus Instances and Interrupt Dispatch
//!
//! Interrupt vectors are plain functions with no arguments, so a vector must
//! find its bus context through a `static`. This module provides that
//! storage and the per-variant instance table.
//!
//! Both Kinetis buses are driven through the same register layout selected
//! by base address at run time, so the two contexts of a board share one
//! type and fit in one array:
//!
//! ```rust,ignore
//! static BUSES: I2cRegistry<KinetisBus<BoardPins, BoardPlatform>> = I2cRegistry::new();
//!
//! #[interrupt]
//! fn I2C0() {
//!     unsafe { BUSES.on_interrupt(BusId::I2c0) };
//! }
//!
//! #[interrupt]
//! fn PORTB() {
//!     // SDA pin change, slave STOP detection on the 3.x parts
//!     unsafe { BUSES.on_sda_rising(BusId::I2c0) };
//! }
//! ```
//!
//! The DMA completion vector of a bus's channel dispatches to
//! [`I2cRegistry::on_interrupt`] as well.
//!
//! ## Ownership
//!
//! A slot is written once by [`I2cRegistry::install`] before the bus's
//! interrupts are enabled. Afterwards mainline code and the interrupt handler
//! both reach the context; they never run the same code path at once because
//! a transfer hands the context to the interrupt handler when it is armed and
//! gets it back at a terminal status.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{BusId, ChipVariant, Error, I2cConfig, BUS_COUNT};
use crate::i2c::i2c_controller::I2cController;
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::{base_address, I2cRegisters, KinetisRegisters};
use crate::i2c::traits::{BusPins, I2cHardwareCore, Platform};
use core::cell::UnsafeCell;
use proposed_traits::i2c_target::I2CTarget;

/// Target that accepts every address, discards writes and answers reads
/// with zeros. Used for buses that only act as master.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullTarget {
    address: u8,
}

impl NullTarget {
    #[must_use]
    pub fn new() -> Self {
        Self { address: 0 }
    }

    /// Address passed to the last `init`.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }
}

impl embedded_hal::i2c::ErrorType for NullTarget {
    type Error = Error;
}

impl proposed_traits::i2c_target::I2CCoreTarget for NullTarget {
    fn init(&mut self, address: u8) -> Result<(), Self::Error> {
        self.address = address;
        Ok(())
    }
    fn on_transaction_start(&mut self, _repeated: bool) {}
    fn on_stop(&mut self) {}
    fn on_address_match(&mut self, _address: u8) -> bool {
        true
    }
}

impl proposed_traits::i2c_target::ReadTarget for NullTarget {
    fn on_read(&mut self, _buffer: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl proposed_traits::i2c_target::WriteTarget for NullTarget {
    fn on_write(&mut self, _data: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl proposed_traits::i2c_target::WriteReadTarget for NullTarget {}

impl proposed_traits::i2c_target::RegisterAccess for NullTarget {
    fn write_register(&mut self, _register: u8, _data: u8) -> Result<(), Self::Error> {
        Ok(())
    }
    fn read_register(&mut self, _register: u8, _data: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

/// Memory-mapped master-only bus context.
pub type KinetisBus<P, E> = KinetisI2c<KinetisRegisters, P, E, NullTarget, NoOpLogger>;

/// embedded-hal controller over a memory-mapped master-only bus.
pub type KinetisController<P, E> = I2cController<KinetisBus<P, E>, NoOpLogger>;

/// Register block and interrupt of one bus on one chip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusInstance {
    pub bus: BusId,
    pub base: usize,
    pub irq: u16,
}

/// Instance description of `bus`, or `None` when the variant lacks it.
#[must_use]
pub const fn bus_instance(variant: ChipVariant, bus: BusId) -> Option<BusInstance> {
    if bus.index() >= variant.bus_count() {
        return None;
    }
    Some(BusInstance {
        bus,
        base: base_address(bus),
        irq: variant.irq_number(bus),
    })
}

/// Creates a master-only context on the memory-mapped peripheral of `bus`.
///
/// Returns `None` when the chip variant has no such bus.
///
/// # Safety
///
/// The caller must own the bus's register block exclusively and create at
/// most one context per bus.
pub unsafe fn new_bus<P: BusPins, E: Platform>(
    bus: BusId,
    pins: P,
    platform: E,
    config: I2cConfig,
) -> Option<KinetisBus<P, E>> {
    let instance = bus_instance(config.variant, bus)?;
    let regs = KinetisRegisters::new(instance.base);
    Some(KinetisI2c::new(
        bus,
        regs,
        pins,
        platform,
        NullTarget::new(),
        NoOpLogger,
        config,
    ))
}

/// Entry points the interrupt vectors call on an installed context.
pub trait InterruptEntry {
    /// Bus interrupt or DMA completion.
    fn bus_interrupt(&mut self);
    /// SDA rising edge while a slave receive is in progress.
    fn sda_rising(&mut self);
}

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger> InterruptEntry
    for KinetisI2c<R, P, E, I2CT, L>
{
    fn bus_interrupt(&mut self) {
        self.handle_interrupt();
    }

    fn sda_rising(&mut self) {
        self.on_sda_rising();
    }
}

struct BusSlot<T>(UnsafeCell<Option<T>>);

impl<T> BusSlot<T> {
    const fn new() -> Self {
        Self(UnsafeCell::new(None))
    }
}

/// Fixed storage for one context per bus, reachable from interrupt vectors.
pub struct I2cRegistry<T> {
    slots: [BusSlot<T>; BUS_COUNT],
}

// SAFETY: single core; accesses to a slot are serialized by the ownership
// convention in the module documentation.
unsafe impl<T: Send> Sync for I2cRegistry<T> {}

impl<T> Default for I2cRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> I2cRegistry<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [BusSlot::new(), BusSlot::new()],
        }
    }

    /// Stores the context of `bus`. An occupied slot is left untouched and
    /// the context is handed back.
    ///
    /// # Safety
    ///
    /// Must be called before the bus's interrupts are enabled and never
    /// concurrently with another access to the same slot.
    ///
    /// # Errors
    ///
    /// Returns `context` when the slot is already occupied.
    pub unsafe fn install(&self, bus: BusId, context: T) -> Result<(), T> {
        let Some(slot) = self.slots.get(bus.index()) else {
            return Err(context);
        };
        let slot = &mut *slot.0.get();
        if slot.is_some() {
            return Err(context);
        }
        *slot = Some(context);
        Ok(())
    }

    /// Context of `bus`, if installed.
    ///
    /// # Safety
    ///
    /// The returned reference must not coexist with another reference to the
    /// same context obtained through the registry.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, bus: BusId) -> Option<&mut T> {
        self.slots
            .get(bus.index())
            .and_then(|slot| (*slot.0.get()).as_mut())
    }
}

impl<T: InterruptEntry> I2cRegistry<T> {
    /// Vector entry for the bus interrupt and its DMA completion interrupt.
    ///
    /// # Safety
    ///
    /// Only call from the bus's interrupt vectors.
    pub unsafe fn on_interrupt(&self, bus: BusId) {
        if let Some(context) = self.get_mut(bus) {
            context.bus_interrupt();
        }
    }

    /// Vector entry for the SDA pin change interrupt.
    ///
    /// # Safety
    ///
    /// Only call from the SDA pin's port interrupt vector.
    pub unsafe fn on_sda_rising(&self, bus: BusId) {
        if let Some(context) = self.get_mut(bus) {
            context.sda_rising();
        }
    }
}
