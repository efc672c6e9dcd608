// Licensed under the Apache-2.0 license

//! Slave transmit and receive.
//!
//! The peripheral raises no interrupt when a master ends a write with STOP,
//! except on the LC which has a STOPF interrupt. Elsewhere an SDA rising-edge
//! interrupt is armed for the duration of a slave receive: SDA rising while
//! the bus is idle is the STOP. Rising edges during data bits are ignored,
//! and the edge interrupt disarms itself after two of them.

use crate::common::Logger;
use crate::i2c::buffer::BUFFER_LEN;
use crate::i2c::common::{I2cMode, I2cStatus};
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::{FltValue, I2cRegisters, C1Value, StatusValue, C1, FLT, S};
use crate::i2c::traits::{BusPins, Platform};
use proposed_traits::i2c_target::{I2CCoreTarget, I2CTarget, ReadTarget, WriteTarget};

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    KinetisI2c<R, P, E, I2CT, L>
{
    pub(crate) fn isr_slave(&mut self, status: StatusValue, control: C1Value, filter: FltValue) {
        if status.is_set(S::ARBL) {
            self.regs.clear_status(S::ARBL::SET);
            if !status.is_set(S::IAAS) {
                self.regs.clear_status(S::IICIF::SET);
                return;
            }
        }

        if status.is_set(S::IAAS) {
            self.isr_slave_addressed(status);
        } else if control.is_set(C1::TX) {
            self.isr_slave_transmit(status);
        } else if self.config.variant.native_stop_detect() && filter.is_set(FLT::STOPF) {
            self.regs.clear_stop_flag();
            self.end_slave_receive();
        } else {
            self.arm_stop_detect();
            let byte = self.regs.read_data();
            self.rx.push(byte);
        }
        self.regs.clear_status(S::IICIF::SET);
    }

    fn isr_slave_addressed(&mut self, status: StatusValue) {
        let repeated = self.status.get() == I2cStatus::SlaveReceive;
        if repeated {
            self.deliver_receive();
        }

        if status.is_set(S::SRW) {
            self.status.set(I2cStatus::SlaveTransmit);
            self.tx.clear();
            self.regs
                .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::TX::SET);
            self.accept_address(repeated);

            if self.slave_accepted {
                let len = self
                    .target
                    .on_read(self.tx.data.as_mut_slice())
                    .unwrap_or(0);
                self.tx.len = len.min(BUFFER_LEN);
            }
            if self.tx.is_empty() {
                // Nothing to send: the master reads zeros.
                if let Some(first) = self.tx.data.first_mut() {
                    *first = 0;
                }
            }
            self.regs.write_data(self.tx.byte(0));
            self.tx.index = 1;
        } else {
            self.arm_stop_detect();
            self.status.set(I2cStatus::SlaveReceive);
            self.rx.clear();
            self.regs.write_control1(C1::IICEN::SET + C1::IICIE::SET);
            self.accept_address(repeated);
        }
    }

    /// Reads the matched address from D and offers it to the target.
    fn accept_address(&mut self, repeated: bool) {
        self.rx_addr = self.regs.read_data() >> 1;
        self.slave_accepted = self.target.on_address_match(self.rx_addr);
        self.target.on_transaction_start(repeated);
    }

    fn isr_slave_transmit(&mut self, status: StatusValue) {
        if status.is_set(S::RXAK) {
            // Master NAKed: the read is over.
            self.regs.write_control1(C1::IICEN::SET + C1::IICIE::SET);
            let _ = self.regs.read_data();
            self.status.set(I2cStatus::Waiting);
            self.target.on_stop();
        } else {
            let byte = if self.tx.index < self.tx.len() {
                let byte = self.tx.byte(self.tx.index);
                self.tx.index += 1;
                byte
            } else {
                0
            };
            self.regs.write_data(byte);
            self.regs
                .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::TX::SET);
        }
    }

    fn deliver_receive(&mut self) {
        self.rx.index = 0;
        if self.slave_accepted {
            // Target errors have no way back to the master.
            let _ = self.target.on_write(self.rx.as_slice());
        }
    }

    fn end_slave_receive(&mut self) {
        if self.status.get() == I2cStatus::SlaveReceive {
            self.status.set(I2cStatus::Waiting);
            self.deliver_receive();
            self.target.on_stop();
        }
    }

    fn arm_stop_detect(&mut self) {
        if self.config.variant.native_stop_detect() {
            self.regs.modify_filter(FLT::STOPIE::SET);
        } else {
            self.irq_count = 0;
            if !self.sda_armed {
                self.pins.arm_sda_rising(self.current_pins);
                self.sda_armed = true;
            }
        }
    }

    fn disarm_stop_detect(&mut self) {
        if self.sda_armed {
            self.pins.disarm_sda_rising(self.current_pins);
            self.sda_armed = false;
        }
    }

    /// SDA rising-edge interrupt entry, armed during slave receive.
    pub fn on_sda_rising(&mut self) {
        if !self.regs.status().is_set(S::BUSY) {
            self.disarm_stop_detect();
            self.end_slave_receive();
            return;
        }

        self.irq_count = self.irq_count.saturating_add(1);
        if self.irq_count >= 2 || self.mode != I2cMode::Slave {
            self.disarm_stop_detect();
        }
    }
}
