// Licensed under the Apache-2.0 license

//! Master transmit and receive.
//!
//! Each direction has a polled form, run to completion in the caller's
//! context, and an interrupt form, armed by the caller and advanced one byte
//! per interrupt. Both produce the same terminal statuses.
//!
//! Receive NAKs the final byte by setting TXAK while the second to last byte
//! is read, and switches to transmit mode before reading the final byte so
//! that reading D does not clock in another one.

use crate::common::Logger;
use crate::i2c::common::{DmaState, I2cStatus, OpMode, StopPolicy};
use crate::i2c::dma::DMA_THRESHOLD;
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::{I2cRegisters, StatusValue, C1, S};
use crate::i2c::traits::{BusPins, DmaChannel, MicrosClock, MicrosInstant, Platform};
use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;
use proposed_traits::i2c_target::I2CTarget;

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    KinetisI2c<R, P, E, I2CT, L>
{
    /// Spins until the current byte completes, bounded by the transfer deadline.
    fn wait_byte(&mut self, start: MicrosInstant, timeout: MicrosDurationU32) -> bool {
        loop {
            if self.regs.status().is_set(S::IICIF) {
                self.regs.clear_status(S::IICIF::SET);
                return true;
            }
            if self.platform.expired(start, timeout) {
                return false;
            }
        }
    }

    pub(crate) fn settle_then_stop(&mut self) {
        if self.stop == StopPolicy::Stop {
            self.platform.delay_us(self.config.stop_settle.ticks());
            self.regs.write_control1(C1::IICEN::SET);
        }
    }

    pub(crate) fn transmit_polled(&mut self, timeout: MicrosDurationU32) {
        let start = self.platform.now();
        self.status.set(I2cStatus::Sending);

        let len = self.tx.len();
        let mut index = 0;
        while index < len && !self.platform.expired(start, timeout) {
            self.regs.write_data(self.tx.byte(index));
            if !self.wait_byte(start, timeout) {
                break;
            }

            let status = self.regs.status();
            if status.is_set(S::ARBL) {
                self.regs.write_control1(C1::IICEN::SET);
                self.regs.clear_status(S::ARBL::SET);
                self.fail(I2cStatus::ArbitrationLost);
                return;
            }
            if status.is_set(S::RXAK) {
                // A NAK always ends in STOP, whatever the stop policy.
                self.regs.write_control1(C1::IICEN::SET);
                self.fail(if index == 0 {
                    I2cStatus::AddressNak
                } else {
                    I2cStatus::DataNak
                });
                return;
            }
            index += 1;
        }

        if index < len {
            self.fail(I2cStatus::Timeout);
        } else {
            self.status.set(I2cStatus::Waiting);
        }
        self.release_or_hold();
    }

    pub(crate) fn receive_polled(&mut self, address: u8, timeout: MicrosDurationU32) {
        let start = self.platform.now();
        self.status.set(I2cStatus::SendingAddress);

        self.regs.write_data((address << 1) | 1);
        if !self.wait_byte(start, timeout) {
            self.regs.write_control1(C1::IICEN::SET);
            self.fail(I2cStatus::Timeout);
            return;
        }

        let status = self.regs.status();
        if status.is_set(S::ARBL) {
            self.regs.write_control1(C1::IICEN::SET);
            self.regs.clear_status(S::ARBL::SET);
            self.fail(I2cStatus::ArbitrationLost);
            return;
        }
        if status.is_set(S::RXAK) {
            self.regs.write_control1(C1::IICEN::SET);
            self.fail(I2cStatus::AddressNak);
            return;
        }

        self.status.set(I2cStatus::Receiving);
        if self.req_count == 1 {
            self.regs
                .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TXAK::SET);
        } else {
            self.regs.write_control1(C1::IICEN::SET + C1::MST::SET);
        }
        // Dummy read starts the first byte.
        let _ = self.regs.read_data();

        while self.rx.len() < self.req_count && self.status.get() == I2cStatus::Receiving {
            let arrived = self.wait_byte(start, timeout);
            let timed_out = !arrived || self.platform.expired(start, timeout);
            let received = self.rx.len();

            if received + 2 == self.req_count || (timed_out && !self.timeout_rx_nak) {
                self.regs
                    .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TXAK::SET);
            }

            if received + 1 >= self.req_count || (timed_out && self.timeout_rx_nak) {
                self.timeout_rx_nak = false;
                self.regs
                    .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TX::SET);
                let byte = self.regs.read_data();
                self.rx.push(byte);
                if timed_out {
                    self.fail(I2cStatus::Timeout);
                } else {
                    self.status.set(I2cStatus::Waiting);
                }
                self.settle_then_stop();
            } else {
                let byte = self.regs.read_data();
                self.rx.push(byte);
                if timed_out {
                    self.timeout_rx_nak = true;
                }
            }
        }
    }

    /// Arms an interrupt driven transmit of the whole buffer, address first.
    pub(crate) fn start_transmit(&mut self) {
        self.status.set(I2cStatus::Sending);
        self.tx.index = 0;
        if self.op_mode == OpMode::Dma && self.tx.len() >= DMA_THRESHOLD {
            self.arm_dma_transmit();
        }
        self.regs
            .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TX::SET);
        self.regs.write_data(self.tx.byte(0));
    }

    /// Arms an interrupt driven receive of `req_count` bytes.
    pub(crate) fn start_receive(&mut self, address: u8) {
        self.status.set(I2cStatus::SendingAddress);
        if self.op_mode == OpMode::Dma && self.req_count >= DMA_THRESHOLD {
            self.arm_dma_receive();
        }
        self.regs
            .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TX::SET);
        self.regs.write_data((address << 1) | 1);
    }

    pub(crate) fn isr_master_transmit(&mut self, status: StatusValue) {
        if matches!(
            self.dma_state.get(),
            DmaState::BulkPhase | DmaState::LastBytePhase
        ) && !self.isr_dma_transmit(status)
        {
            return;
        }

        match self.status.get() {
            I2cStatus::Sending => self.isr_sending(status),
            I2cStatus::SendingAddress => self.isr_address_sent(status),
            I2cStatus::Timeout => {
                // Late byte of a transfer already abandoned by the caller.
                self.release_or_hold();
                self.regs.clear_status(S::IICIF::SET);
            }
            _ => {
                self.regs.write_control1(C1::IICEN::SET);
                self.regs.clear_status(S::IICIF::SET);
            }
        }
    }

    /// Abandons the master transfer after another master won the bus.
    pub(crate) fn isr_arbitration_lost(&mut self) {
        if self.dma_state.get() != DmaState::Off {
            if let Some(channel) = self.dma.as_mut() {
                channel.disable();
                channel.clear_interrupt();
            }
            self.dma_state.set(DmaState::Off);
        }
        self.regs.write_control1(C1::IICEN::SET);
        self.regs.clear_status(S::ARBL::SET + S::IICIF::SET);
        self.tx.index = 0;
        self.fail_from_isr(I2cStatus::ArbitrationLost);
    }

    fn isr_sending(&mut self, status: StatusValue) {
        if status.is_set(S::RXAK) {
            self.dma_state.set(DmaState::Off);
            self.regs.write_control1(C1::IICEN::SET);
            let nak = if self.tx.index == 0 {
                I2cStatus::AddressNak
            } else {
                I2cStatus::DataNak
            };
            self.fail_from_isr(nak);
        } else {
            self.tx.index += 1;
            if self.tx.index >= self.tx.len() {
                self.status.set(I2cStatus::Waiting);
                self.release_or_hold();
                if let Some(on_transmit_done) = self.callbacks.on_transmit_done {
                    on_transmit_done();
                }
            } else if self.dma_state.get() == DmaState::AddressPhase {
                self.start_dma_transmit();
            } else {
                self.regs.write_data(self.tx.byte(self.tx.index));
            }
        }
        self.regs.clear_status(S::IICIF::SET);
    }

    fn isr_address_sent(&mut self, status: StatusValue) {
        if status.is_set(S::RXAK) {
            self.dma_state.set(DmaState::Off);
            self.regs.write_control1(C1::IICEN::SET);
            self.fail_from_isr(I2cStatus::AddressNak);
        } else if self.dma_state.get() == DmaState::AddressPhase {
            self.start_dma_receive();
        } else {
            self.status.set(I2cStatus::Receiving);
            if self.req_count == 1 {
                self.regs.write_control1(
                    C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TXAK::SET,
                );
            } else {
                self.regs
                    .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET);
            }
            let _ = self.regs.read_data();
        }
        self.regs.clear_status(S::IICIF::SET);
    }

    pub(crate) fn isr_master_receive(&mut self, status: StatusValue) {
        if matches!(
            self.dma_state.get(),
            DmaState::BulkPhase | DmaState::LastBytePhase
        ) && !self.isr_dma_receive(status)
        {
            return;
        }

        let timed_out = self.status.get() == I2cStatus::Timeout;
        let nak_sent = self.timeout_rx_nak;
        let received = self.rx.len();

        if received + 2 == self.req_count || (timed_out && !nak_sent) {
            self.regs.write_control1(
                C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TXAK::SET,
            );
        }

        if received + 1 >= self.req_count || (timed_out && nak_sent) {
            self.timeout_rx_nak = false;
            if !timed_out {
                self.status.set(I2cStatus::Waiting);
            }
            self.regs
                .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TX::SET);
            let byte = self.regs.read_data();
            self.rx.push(byte);
            self.settle_then_stop();
            if !timed_out {
                if let Some(on_request_done) = self.callbacks.on_request_done {
                    on_request_done();
                }
            }
        } else {
            let byte = self.regs.read_data();
            self.rx.push(byte);
            if timed_out {
                self.timeout_rx_nak = true;
            }
        }
        self.regs.clear_status(S::IICIF::SET);
    }
}
