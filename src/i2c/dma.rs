// Licensed under the Apache-2.0 license

//! DMA hand-off for long master transfers.
//!
//! The interrupt path sends the address byte while the channel is armed
//! ([`DmaState::AddressPhase`]). The channel then moves the body of the
//! transfer ([`DmaState::BulkPhase`]) and reports completion one byte early,
//! so the interrupt path takes the final byte back ([`DmaState::LastBytePhase`]).
//!
//! Transmit: the interrupt path sends the address byte and byte 1, the
//! channel sends bytes 2 to len-2 and the interrupt path sends the last one.
//! Receive: the channel stores bytes 0 to req-2 and the interrupt path NAKs
//! and stores the final byte.
//!
//! The channel reads and writes the context's buffers through raw pointers,
//! so a context must not move while a DMA transfer is active.

use crate::common::Logger;
use crate::i2c::common::{DmaState, ErrorCounter, I2cStatus};
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::{I2cRegisters, StatusValue, C1, S};
use crate::i2c::traits::{BusPins, DmaChannel, MicrosClock, Platform};
use fugit::MicrosDurationU32;
use proposed_traits::i2c_target::I2CTarget;

/// Shortest transfer worth handing to the channel, in bytes including the
/// address byte for transmit and excluding it for receive.
pub const DMA_THRESHOLD: usize = 5;

/// Upper bound on the wait for the final bulk byte to leave the shifter.
const LAST_BYTE_TCF_WAIT: MicrosDurationU32 = MicrosDurationU32::from_ticks(1_000);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Direction {
    Transmit,
    Receive,
}

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    KinetisI2c<R, P, E, I2CT, L>
{
    pub(crate) fn arm_dma_transmit(&mut self) {
        let data_register = self.regs.data_register_address();
        let len = self.tx.len();
        let (Some(channel), Some(body)) =
            (self.dma.as_mut(), self.tx.data.get(2..len.saturating_sub(1)))
        else {
            return;
        };
        // SAFETY: the transmit buffer is not written again until the transfer
        // is terminal, and every terminal path disables the channel first.
        unsafe { channel.configure_transmit(body.as_ptr(), body.len(), data_register) };
        self.dma_state.set(DmaState::AddressPhase);
    }

    pub(crate) fn arm_dma_receive(&mut self) {
        let data_register = self.regs.data_register_address();
        let count = self.req_count.saturating_sub(1);
        let (Some(channel), Some(body)) = (self.dma.as_mut(), self.rx.data.get_mut(..count)) else {
            return;
        };
        // SAFETY: the receive buffer is only read by the caller once the
        // transfer is terminal, after the channel has stopped.
        unsafe { channel.configure_receive(data_register, body.as_mut_ptr(), body.len()) };
        self.dma_state.set(DmaState::AddressPhase);
    }

    /// Address byte acknowledged: byte 1 goes out by hand, the channel
    /// follows on each transfer-complete request.
    pub(crate) fn start_dma_transmit(&mut self) {
        self.dma_state.set(DmaState::BulkPhase);
        self.regs.write_control1(
            C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TX::SET + C1::DMAEN::SET,
        );
        if let Some(channel) = self.dma.as_mut() {
            channel.enable();
        }
        self.regs.write_data(self.tx.byte(1));
    }

    pub(crate) fn start_dma_receive(&mut self) {
        self.dma_state.set(DmaState::BulkPhase);
        self.status.set(I2cStatus::Receiving);
        self.regs
            .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::DMAEN::SET);
        if let Some(channel) = self.dma.as_mut() {
            channel.enable();
        }
        let _ = self.regs.read_data();
    }

    /// Returns true when the interrupt should continue on the byte path.
    pub(crate) fn isr_dma_transmit(&mut self, status: StatusValue) -> bool {
        let Some(channel) = self.dma.as_ref() else {
            self.dma_state.set(DmaState::Off);
            return true;
        };
        let complete = channel.is_complete();
        let error = channel.has_error();

        match self.dma_state.get() {
            DmaState::BulkPhase if status.is_set(S::RXAK) => {
                self.abort_dma_on_nak();
                return false;
            }
            DmaState::BulkPhase if error => {
                return self.recover_dma(status, Direction::Transmit);
            }
            DmaState::BulkPhase if complete => {
                if let Some(channel) = self.dma.as_mut() {
                    channel.clear_interrupt();
                }
                // The last bulk byte is still shifting out.
                self.regs
                    .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TX::SET);
                self.dma_state.set(DmaState::LastBytePhase);
            }
            DmaState::LastBytePhase => {
                let start = self.platform.now();
                while !self.regs.status().is_set(S::TCF)
                    && !self.platform.expired(start, LAST_BYTE_TCF_WAIT)
                {}
                if self.regs.status().is_set(S::RXAK) {
                    self.abort_dma_on_nak();
                    return false;
                }
                if let Some(channel) = self.dma.as_mut() {
                    channel.clear_complete();
                }
                self.dma_state.set(DmaState::Off);
                self.tx.index = self.tx.len().saturating_sub(1);
                self.regs.write_data(self.tx.byte(self.tx.index));
            }
            _ => {}
        }
        self.regs.clear_status(S::IICIF::SET);
        false
    }

    /// The slave refused a bulk byte: the channel must not feed it another.
    fn abort_dma_on_nak(&mut self) {
        if let Some(channel) = self.dma.as_mut() {
            channel.disable();
            channel.clear_interrupt();
            channel.clear_complete();
        }
        self.dma_state.set(DmaState::Off);
        self.regs.write_control1(C1::IICEN::SET);
        self.regs.clear_status(S::IICIF::SET);
        self.fail_from_isr(I2cStatus::DataNak);
    }

    /// Returns true when the interrupt should continue on the byte path.
    pub(crate) fn isr_dma_receive(&mut self, status: StatusValue) -> bool {
        let Some(channel) = self.dma.as_ref() else {
            self.dma_state.set(DmaState::Off);
            return true;
        };
        let complete = channel.is_complete();
        let error = channel.has_error();

        match self.dma_state.get() {
            DmaState::BulkPhase if error => {
                return self.recover_dma(status, Direction::Receive);
            }
            DmaState::BulkPhase if complete => {
                if let Some(channel) = self.dma.as_mut() {
                    channel.clear_interrupt();
                }
                // The final byte is already being clocked in; NAK it.
                self.regs.write_control1(
                    C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TXAK::SET,
                );
                self.dma_state.set(DmaState::LastBytePhase);
            }
            DmaState::LastBytePhase => {
                if let Some(channel) = self.dma.as_mut() {
                    channel.clear_complete();
                }
                self.dma_state.set(DmaState::Off);
                let timed_out = self.status.get() == I2cStatus::Timeout;
                if !timed_out {
                    self.status.set(I2cStatus::Waiting);
                }
                self.regs
                    .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TX::SET);
                self.rx.len = self.req_count.saturating_sub(1);
                self.rx.index = 0;
                let byte = self.regs.read_data();
                self.rx.push(byte);
                self.settle_then_stop();
                if !timed_out {
                    if let Some(on_request_done) = self.callbacks.on_request_done {
                        on_request_done();
                    }
                }
            }
            _ => {}
        }
        self.regs.clear_status(S::IICIF::SET);
        false
    }

    /// Stops the channel after an error and resumes the transfer on the
    /// interrupt path at the byte the channel reached.
    ///
    /// Returns true when a byte-complete interrupt is pending and should be
    /// handled by the byte path right away.
    fn recover_dma(&mut self, status: StatusValue, direction: Direction) -> bool {
        let Some(channel) = self.dma.as_mut() else {
            return true;
        };
        let remaining = channel.remaining();
        channel.disable();
        channel.clear_interrupt();
        channel.clear_error();
        self.dma_state.set(DmaState::Off);

        let configured = match direction {
            Direction::Transmit => self.tx.len().saturating_sub(3),
            Direction::Receive => self.req_count.saturating_sub(1),
        };
        let Some(moved) = configured.checked_sub(remaining) else {
            self.regs.write_control1(C1::IICEN::SET);
            self.regs.clear_status(S::IICIF::SET);
            self.fail_from_isr(I2cStatus::DmaError);
            return false;
        };
        self.counters.increment(ErrorCounter::DmaError);

        match direction {
            Direction::Transmit => {
                // Byte 1 plus `moved` channel bytes have been written to D.
                self.tx.index = 1 + moved;
                self.regs
                    .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET + C1::TX::SET);
            }
            Direction::Receive => {
                self.rx.len = moved;
                self.rx.index = 0;
                if self.status.get() != I2cStatus::Timeout {
                    self.status.set(I2cStatus::Receiving);
                }
                self.regs
                    .write_control1(C1::IICEN::SET + C1::IICIE::SET + C1::MST::SET);
            }
        }
        status.is_set(S::IICIF)
    }
}
