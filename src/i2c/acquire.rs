// Licensed under the Apache-2.0 license

//! Bus acquisition.
//!
//! A master transfer first has to own the bus: either it still holds it from
//! a previous `NoStop` transfer (repeated START), or it waits for the bus to
//! go idle and issues a START. Interrupt driven transfers then make sure the
//! bus interrupt can preempt the caller, raising the interrupt's priority or
//! falling back to polling when that is impossible.

use crate::common::Logger;
use crate::i2c::common::{Error, ErrorCounter, I2cMode, I2cStatus, OpMode};
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::{I2cRegisters, C1, S};
use crate::i2c::traits::{BusPins, InterruptPriority, MicrosClock, Platform};
use fugit::MicrosDurationU32;
use proposed_traits::i2c_target::I2CTarget;

/// NVIC priority granularity on the supported parts (4 implemented bits).
pub(crate) const PRIORITY_STEP: u16 = 16;

/// How an acquired transfer is driven.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Poll the status flags from the calling context.
    Polled,
    /// Arm the transfer and return; the interrupt handler drives it.
    Interrupt,
}

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    KinetisI2c<R, P, E, I2CT, L>
{
    /// Takes master ownership of the bus.
    ///
    /// On failure the terminal status is recorded and counted, and the
    /// matching error is returned.
    pub(crate) fn acquire_bus(&mut self, timeout: MicrosDurationU32) -> Result<Dispatch, Error> {
        if self.regs.control1().is_set(C1::MST) {
            // Bus held from a NoStop transfer.
            self.regs
                .write_control1(C1::IICEN::SET + C1::MST::SET + C1::RSTA::SET + C1::TX::SET);
        } else {
            let start = self.platform.now();
            let mut issued = self.try_claim();
            while !issued && !self.platform.expired(start, timeout) {
                issued = self.try_claim();
            }

            if !issued && self.config.auto_retry {
                self.reset_bus();
                issued = self.try_claim();
            }

            if !self.regs.control1().is_set(C1::MST) {
                if issued {
                    self.fail(I2cStatus::NotAcquired);
                } else {
                    self.fail(I2cStatus::Timeout);
                    self.counters.increment(ErrorCounter::NotAcquired);
                }
                crate::log_error!(
                    self.logger,
                    "i2c{}: bus not acquired ({:?})",
                    self.bus.index(),
                    self.status.get()
                );
                return Err(self.status.get().error().unwrap_or(Error::BusNotAcquired));
            }
        }

        if self.op_mode == OpMode::Immediate {
            return Ok(Dispatch::Polled);
        }
        Ok(self.escalate_priority())
    }

    /// Issues a START if the bus is idle. Returns whether the claim was issued.
    fn try_claim(&mut self) -> bool {
        if self.regs.status().is_set(S::BUSY) {
            return false;
        }
        self.mode = I2cMode::Master;
        self.regs
            .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TX::SET);
        true
    }

    /// Makes sure the bus interrupt can preempt the caller.
    ///
    /// When the caller runs at or above the interrupt's priority, the
    /// interrupt is raised one step above the caller. A caller already at the
    /// top step cannot be preempted, so the transfer is polled instead.
    fn escalate_priority(&mut self) -> Dispatch {
        let irq = self.irq();
        let current = self.platform.execution_priority();
        let irq_priority = u16::from(self.platform.irq_priority(irq));

        if current > irq_priority {
            return Dispatch::Interrupt;
        }
        if current < PRIORITY_STEP {
            crate::log_debug!(
                self.logger,
                "i2c{}: caller priority {}, running transfer immediate",
                self.bus.index(),
                current
            );
            return Dispatch::Polled;
        }

        let raised = u8::try_from(current - PRIORITY_STEP).unwrap_or(u8::MAX);
        self.platform.set_irq_priority(irq, raised);
        Dispatch::Interrupt
    }
}
