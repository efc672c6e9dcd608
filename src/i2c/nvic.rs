// Licensed under the Apache-2.0 license

//! Cortex-M interrupt priorities for bus acquisition.
//!
//! The execution priority is derived from PRIMASK and the active vector.
//! BASEPRI is not consulted: the LC is ARMv6-M, which lacks it, and the
//! driver never raises it on the other parts.

use crate::i2c::traits::InterruptPriority;
use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::scb::{Exception, SystemHandler, VectActive};
use cortex_m::peripheral::{NVIC, SCB};
use cortex_m::register::primask;

/// Priority reported for thread mode, below every configurable priority.
pub const THREAD_MODE_PRIORITY: u16 = 256;

/// Device interrupt number of a bus instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cIrq(pub u16);

// SAFETY: the numbers come from the chip variant's vector table and are
// valid device interrupts for it.
unsafe impl InterruptNumber for I2cIrq {
    fn number(self) -> u16 {
        self.0
    }
}

/// NVIC-backed [`InterruptPriority`].
#[derive(Copy, Clone, Debug, Default)]
pub struct CortexMPriority;

impl InterruptPriority for CortexMPriority {
    fn execution_priority(&self) -> u16 {
        if primask::read().is_inactive() {
            return 0;
        }
        match SCB::vect_active() {
            VectActive::ThreadMode => THREAD_MODE_PRIORITY,
            VectActive::Interrupt { irqn } => {
                u16::from(NVIC::get_priority(I2cIrq(u16::from(irqn))))
            }
            VectActive::Exception(Exception::SVCall) => {
                u16::from(SCB::get_priority(SystemHandler::SVCall))
            }
            VectActive::Exception(Exception::PendSV) => {
                u16::from(SCB::get_priority(SystemHandler::PendSV))
            }
            VectActive::Exception(Exception::SysTick) => {
                u16::from(SCB::get_priority(SystemHandler::SysTick))
            }
            // Faults and NMI run above every configurable priority.
            VectActive::Exception(_) => 0,
        }
    }

    fn irq_priority(&self, irq: u16) -> u8 {
        NVIC::get_priority(I2cIrq(irq))
    }

    fn set_irq_priority(&mut self, irq: u16, priority: u8) {
        // SAFETY: only the priority register of the bus's own interrupt is
        // written; raising it cannot break a critical section that relies on
        // masking, since those use PRIMASK.
        unsafe {
            let mut peripherals = cortex_m::Peripherals::steal();
            peripherals.NVIC.set_priority(I2cIrq(irq), priority);
        }
    }

    fn enable_irq(&mut self, irq: u16) {
        // SAFETY: the bus context is installed before its interrupt is unmasked.
        unsafe { NVIC::unmask(I2cIrq(irq)) };
    }
}
