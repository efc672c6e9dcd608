// Licensed under the Apache-2.0 license

//! Kinetis I2C bus context.
//!
//! One [`KinetisI2c`] owns a bus instance: its registers, pins, buffers and
//! the transfer state shared with the interrupt handler. The transfer state
//! machine itself lives in the `acquire`, `master`, `slave`, `dma` and
//! `recovery` modules as further `impl` blocks on this type.
//!
//! Mainline code arms a transfer and then only reads the buffers after
//! observing a terminal status; from arming until then the interrupt handler
//! (or the DMA channel) is the only writer.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::acquire::Dispatch;
use crate::i2c::buffer::{RxBuffer, TxBuffer, BUFFER_LEN};
use crate::i2c::common::{
    BusId, DmaState, DmaStateCell, Error, ErrorCounter, ErrorCounters, I2cConfig, I2cMode,
    I2cStatus, MasterCallbacks, OpMode, PinPair, Pullup, StatusCell, StopPolicy,
};
use crate::i2c::rate::{self, I2cRate};
use crate::i2c::registers::{I2cRegisters, C1, C2, FLT, S};
use crate::i2c::system_setup::{ClockId, I2cSystemSetup, ResetId};
use crate::i2c::traits::{
    BusPins, DmaAllocator, I2cHardwareCore, I2cMaster, InterruptPriority, MicrosClock, Platform,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::MicrosDurationU32;
use openprot_hal_blocking::system_control::SystemControl;
use proposed_traits::i2c_target::{I2CCoreTarget, I2CTarget};

/// Bus settle time after a blocking transfer, so a STOP is seen by every device.
const FINISH_SETTLE_US: u32 = 4;

pub struct KinetisI2c<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger = NoOpLogger>
{
    pub(crate) bus: BusId,
    pub(crate) regs: R,
    pub(crate) pins: P,
    pub(crate) platform: E,
    pub(crate) target: I2CT,
    pub(crate) logger: L,
    pub(crate) config: I2cConfig,
    pub(crate) mode: I2cMode,
    pub(crate) op_mode: OpMode,
    pub(crate) status: StatusCell,
    pub(crate) stop: StopPolicy,
    pub(crate) tx: TxBuffer,
    pub(crate) rx: RxBuffer,
    pub(crate) req_count: usize,
    pub(crate) dma_state: DmaStateCell,
    pub(crate) dma: Option<E::Channel>,
    pub(crate) default_timeout: MicrosDurationU32,
    pub(crate) rx_addr: u8,
    /// A timed-out receive has already NAKed its final byte.
    pub(crate) timeout_rx_nak: bool,
    /// Spurious SDA rising edges seen since the detector was last armed.
    pub(crate) irq_count: u8,
    pub(crate) sda_armed: bool,
    /// The target accepted the address of the current slave transaction.
    pub(crate) slave_accepted: bool,
    pub(crate) callbacks: MasterCallbacks,
    pub(crate) counters: ErrorCounters,
    pub(crate) rate: I2cRate,
    pub(crate) current_pins: PinPair,
    pub(crate) pullup: Pullup,
}

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    KinetisI2c<R, P, E, I2CT, L>
{
    /// Creates an idle, unconfigured context. Call [`KinetisI2c::begin`]
    /// (or [`I2cHardwareCore::init`] when clocks are already gated on)
    /// before the first transfer.
    pub fn new(
        bus: BusId,
        regs: R,
        pins: P,
        platform: E,
        target: I2CT,
        logger: L,
        config: I2cConfig,
    ) -> Self {
        Self {
            bus,
            regs,
            pins,
            platform,
            target,
            logger,
            mode: config.mode,
            op_mode: OpMode::Immediate,
            status: StatusCell::new(I2cStatus::Waiting),
            stop: StopPolicy::Stop,
            tx: TxBuffer::new(),
            rx: RxBuffer::new(),
            req_count: 0,
            dma_state: DmaStateCell::new(),
            dma: None,
            default_timeout: config.default_timeout,
            rx_addr: 0,
            timeout_rx_nak: false,
            irq_count: 0,
            sda_armed: false,
            slave_accepted: false,
            callbacks: MasterCallbacks::default(),
            counters: ErrorCounters::default(),
            rate: config.rate,
            current_pins: config
                .pins
                .unwrap_or(config.variant.default_pins(bus)),
            pullup: config.pullup,
            config,
        }
    }

    /// Gates the peripheral clock on, reads the source clocks and programs
    /// the peripheral from the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::SystemControl` when the clock controller fails, or any
    /// error from [`I2cHardwareCore::init`].
    pub fn begin<S>(&mut self, system: &mut S) -> Result<(), Error>
    where
        S: SystemControl<ClockId = ClockId, ResetId = ResetId>,
    {
        I2cSystemSetup::initialize_i2c_system(system, self.bus)?;
        let mut config = self.config;
        config.bus_clock_hz = I2cSystemSetup::get_i2c_source_frequency(system, ClockId::BusClock)?;
        config.core_clock_hz =
            I2cSystemSetup::get_i2c_source_frequency(system, ClockId::CoreClock)?;
        self.init(&config)
    }

    pub(crate) fn irq(&self) -> u16 {
        self.config.variant.irq_number(self.bus)
    }

    /// Selects the execution strategy. Slaves always run interrupt driven,
    /// and DMA falls back to interrupts when no channel is free.
    ///
    /// # Errors
    ///
    /// Returns `Error::Busy` without changing anything while the bus is busy.
    pub fn set_op_mode(&mut self, op_mode: OpMode) -> Result<(), Error> {
        if self.regs.status().is_set(S::BUSY) {
            return Err(Error::Busy);
        }

        self.regs.write_control1(C1::IICEN::SET);
        self.regs.clear_status(S::IICIF::SET + S::ARBL::SET);

        let requested = if self.mode == I2cMode::Slave {
            OpMode::Interrupt
        } else {
            op_mode
        };

        self.op_mode = match requested {
            OpMode::Immediate => OpMode::Immediate,
            OpMode::Interrupt => {
                let irq = self.irq();
                self.platform.enable_irq(irq);
                OpMode::Interrupt
            }
            OpMode::Dma => {
                let irq = self.irq();
                self.platform.enable_irq(irq);
                if self.dma.is_none() {
                    self.dma = self.platform.allocate(self.bus);
                }
                if self.dma.is_some() {
                    self.dma_state.set(DmaState::Off);
                    OpMode::Dma
                } else {
                    crate::log_debug!(
                        self.logger,
                        "i2c{}: no DMA channel, using interrupt mode",
                        self.bus.index()
                    );
                    OpMode::Interrupt
                }
            }
        };

        if self.op_mode != OpMode::Dma {
            if let Some(channel) = self.dma.take() {
                self.platform.release(channel);
            }
        }

        if self.mode == I2cMode::Slave {
            self.regs.write_control1(C1::IICEN::SET + C1::IICIE::SET);
        }

        crate::log_debug!(
            self.logger,
            "i2c{}: op mode {:?}",
            self.bus.index(),
            self.op_mode
        );
        Ok(())
    }

    /// Programs the divider for `rate` from the clock feeding the current pins.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedRate` when the rate is not reachable. The
    /// fallback divider is programmed anyway and reported by [`KinetisI2c::rate`].
    pub fn set_rate(&mut self, rate: I2cRate) -> Result<I2cRate, Error> {
        let source_hz = if self.config.variant.uses_core_clock(self.current_pins) {
            self.config.core_clock_hz
        } else {
            self.config.bus_clock_hz
        };
        let setting = rate::divider(source_hz, rate);

        self.regs.write_divider(setting.f);
        self.regs.modify_filter(FLT::FLT.val(setting.flt));
        if self.config.variant.native_stop_detect() && self.mode == I2cMode::Slave {
            // Re-armed by the state machine on each slave receive.
            self.regs.modify_filter(FLT::STOPIE::CLEAR);
        }
        self.rate = setting.rate;

        if setting.exact {
            Ok(setting.rate)
        } else {
            crate::log_error!(
                self.logger,
                "i2c{}: {} Hz unsupported at {} Hz source, using {:?}",
                self.bus.index(),
                rate.hz(),
                source_hz,
                setting.rate
            );
            Err(Error::UnsupportedRate)
        }
    }

    /// Quantizes `hz` to the nearest rate step and applies it.
    ///
    /// # Errors
    ///
    /// Same as [`KinetisI2c::set_rate`].
    pub fn set_clock(&mut self, hz: u32) -> Result<I2cRate, Error> {
        self.set_rate(I2cRate::from_frequency(hz))
    }

    /// Moves the bus to another pin pair. A pair the bus cannot use selects
    /// the bus's default pair; the previous pair is returned to plain input.
    ///
    /// # Errors
    ///
    /// Returns `Error::Busy` while the bus is busy.
    pub fn pin_configure(&mut self, pins: PinPair, pullup: Pullup) -> Result<(), Error> {
        if self.regs.status().is_set(S::BUSY) {
            return Err(Error::Busy);
        }
        let variant = self.config.variant;
        let pins = if variant.supports_pins(self.bus, pins) {
            pins
        } else {
            variant.default_pins(self.bus)
        };
        if pins != self.current_pins {
            self.pins.release(self.current_pins, pullup);
        }
        self.connect_pins(pins, pullup);
        Ok(())
    }

    pub(crate) fn connect_pins(&mut self, pins: PinPair, pullup: Pullup) {
        self.pins.connect(pins, pullup);
        self.current_pins = pins;
        self.pullup = pullup;
    }

    pub(crate) fn resolve_timeout(&self, timeout: MicrosDurationU32) -> MicrosDurationU32 {
        if timeout.ticks() == 0 {
            self.default_timeout
        } else {
            timeout
        }
    }

    /// Clears stale interrupt, arbitration and STOP flags before a transfer.
    pub(crate) fn clear_flags(&mut self) {
        if self.config.variant.native_stop_detect() {
            self.regs.clear_stop_flag();
        }
        self.regs.clear_status(S::IICIF::SET + S::ARBL::SET);
    }

    /// Records a terminal error status and counts it.
    pub(crate) fn fail(&mut self, status: I2cStatus) {
        self.status.set(status);
        let counter = match status {
            I2cStatus::Timeout => Some(ErrorCounter::Timeout),
            I2cStatus::AddressNak => Some(ErrorCounter::AddressNak),
            I2cStatus::DataNak => Some(ErrorCounter::DataNak),
            I2cStatus::ArbitrationLost => Some(ErrorCounter::ArbitrationLost),
            I2cStatus::NotAcquired => Some(ErrorCounter::NotAcquired),
            I2cStatus::DmaError => Some(ErrorCounter::DmaError),
            _ => None,
        };
        if let Some(counter) = counter {
            self.counters.increment(counter);
        }
    }

    /// [`KinetisI2c::fail`] plus the master error callback.
    pub(crate) fn fail_from_isr(&mut self, status: I2cStatus) {
        self.fail(status);
        if let Some(on_error) = self.callbacks.on_error {
            on_error(status);
        }
    }

    /// Completes a master transfer: STOP, or keep the bus in transmit mode
    /// for a following repeated START.
    pub(crate) fn release_or_hold(&mut self) {
        match self.stop {
            StopPolicy::Stop => self.regs.write_control1(C1::IICEN::SET),
            StopPolicy::NoStop => self
                .regs
                .write_control1(C1::IICEN::SET + C1::MST::SET + C1::TX::SET),
        }
    }

    /// Starts a master transmit buffer addressed to `address`.
    ///
    /// Ignored while a transfer is in progress.
    pub fn begin_transmission(&mut self, address: u8) {
        if !self.done() {
            return;
        }
        self.tx.begin(address);
        self.status.set(I2cStatus::Waiting);
    }

    /// Queues one byte. Returns 0 and flags a write error when the buffer is full.
    pub fn write(&mut self, byte: u8) -> usize {
        self.tx.write(byte)
    }

    /// Queues as many of `bytes` as fit.
    pub fn write_slice(&mut self, bytes: &[u8]) -> usize {
        self.tx.write_slice(bytes)
    }

    /// Transmits the buffer and waits for completion.
    ///
    /// A zero `timeout` selects the default timeout.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the transfer, or `Error::BufferOverflow`
    /// when bytes were dropped while filling the buffer.
    pub fn end_transmission(
        &mut self,
        stop: StopPolicy,
        timeout: MicrosDurationU32,
    ) -> Result<(), Error> {
        self.send_transmission(stop, timeout);
        self.finish(timeout);
        self.last_error().map_or(Ok(()), Err)
    }

    /// Starts transmitting the buffer. In interrupt and DMA modes this
    /// returns once the address byte is on its way; use [`KinetisI2c::done`],
    /// [`KinetisI2c::poll`] or [`KinetisI2c::finish`] to wait.
    pub fn send_transmission(&mut self, stop: StopPolicy, timeout: MicrosDurationU32) {
        if self.tx.is_empty() || !self.done() {
            return;
        }
        let timeout = self.resolve_timeout(timeout);
        self.clear_flags();

        let Ok(dispatch) = self.acquire_bus(timeout) else {
            return;
        };
        self.stop = stop;
        match dispatch {
            Dispatch::Polled => self.transmit_polled(timeout),
            Dispatch::Interrupt => self.start_transmit(),
        }
    }

    /// Reads `len` bytes from `address` and waits for completion.
    ///
    /// Returns the number of bytes received, or 0 on any failure.
    pub fn request_from(
        &mut self,
        address: u8,
        len: usize,
        stop: StopPolicy,
        timeout: MicrosDurationU32,
    ) -> usize {
        if len == 0 {
            return 0;
        }
        self.send_request(address, len, stop, timeout);
        if self.finish(timeout) {
            self.rx.len()
        } else {
            0
        }
    }

    /// Starts reading `len` bytes from `address` into the receive buffer.
    pub fn send_request(
        &mut self,
        address: u8,
        len: usize,
        stop: StopPolicy,
        timeout: MicrosDurationU32,
    ) {
        if len == 0 || !self.done() {
            return;
        }
        if len > BUFFER_LEN {
            self.status.set(I2cStatus::BufferOverflow);
            return;
        }

        self.req_count = len;
        self.rx.clear();
        self.timeout_rx_nak = false;
        let timeout = self.resolve_timeout(timeout);
        self.clear_flags();

        let Ok(dispatch) = self.acquire_bus(timeout) else {
            return;
        };
        self.stop = stop;
        match dispatch {
            Dispatch::Polled => self.receive_polled(address, timeout),
            Dispatch::Interrupt => self.start_receive(address),
        }
    }

    #[must_use]
    pub fn status(&self) -> I2cStatus {
        self.status.get()
    }

    /// Error of the last transfer, including dropped transmit bytes.
    ///
    /// The dropped-bytes flag belongs to the transmit buffer and is only
    /// cleared by the next `begin_transmission`, so it also colours the
    /// result of requests made in between.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.status.get().error().or(if self.tx.write_error() {
            Some(Error::BufferOverflow)
        } else {
            None
        })
    }

    /// Wire-compatible error code: 0 success, 1 overflow, 2 address NAK,
    /// 3 data NAK, 4 anything else.
    #[must_use]
    pub fn error_code(&self) -> u8 {
        self.last_error().map_or(0, Error::code)
    }

    /// True once the current transfer reached a terminal status.
    #[must_use]
    pub fn done(&self) -> bool {
        self.status.get().is_done()
    }

    /// Non-blocking completion check.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while the transfer is active, otherwise the transfer's error.
    pub fn poll(&self) -> nb::Result<(), Error> {
        if !self.done() {
            return Err(nb::Error::WouldBlock);
        }
        match self.last_error() {
            Some(error) => Err(nb::Error::Other(error)),
            None => Ok(()),
        }
    }

    /// Waits for the transfer to finish. An active transfer still running
    /// at the deadline is marked as timed out. Returns true on success.
    pub fn finish(&mut self, timeout: MicrosDurationU32) -> bool {
        let timeout = self.resolve_timeout(timeout);
        let start = self.platform.now();

        let mut outcome = self.poll();
        while matches!(outcome, Err(nb::Error::WouldBlock)) && !self.platform.expired(start, timeout)
        {
            outcome = self.poll();
        }

        if self.op_mode == OpMode::Dma
            && self.dma_state.get() != DmaState::Off
            && self.platform.expired(start, timeout)
        {
            // Ending DMA abruptly can leave BUSY stuck, so let the burst drain
            // for one more timeout period before giving up on it.
            let drain = self.platform.now();
            while !self.done() && !self.platform.expired(drain, timeout) {}
            self.fail(I2cStatus::Timeout);
        }

        if self.status.get().is_master_active() {
            self.fail(I2cStatus::Timeout);
        }

        self.platform.delay_us(FINISH_SETTLE_US);
        self.status.get() == I2cStatus::Waiting
    }

    /// Next received byte.
    pub fn read(&mut self) -> Option<u8> {
        self.rx.read()
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.rx.peek()
    }

    /// Next received byte, 0 when none is left.
    pub fn read_byte(&mut self) -> u8 {
        self.rx.read_byte()
    }

    #[must_use]
    pub fn peek_byte(&self) -> u8 {
        self.rx.peek_byte()
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.rx.available()
    }

    pub fn rx_buffer_mut(&mut self) -> &mut RxBuffer {
        &mut self.rx
    }

    pub fn tx_buffer_mut(&mut self) -> &mut TxBuffer {
        &mut self.tx
    }

    pub fn set_callbacks(&mut self, callbacks: MasterCallbacks) {
        self.callbacks = callbacks;
    }

    /// Address matched by the last slave transaction.
    #[must_use]
    pub fn rx_addr(&self) -> u8 {
        self.rx_addr
    }

    #[must_use]
    pub fn error_count(&self, counter: ErrorCounter) -> u32 {
        self.counters.get(counter)
    }

    pub fn zero_error_count(&self, counter: ErrorCounter) {
        self.counters.zero(counter);
    }

    /// Timeout used when an operation passes zero. Zero waits forever.
    pub fn set_default_timeout(&mut self, timeout: MicrosDurationU32) {
        self.default_timeout = timeout;
    }

    #[must_use]
    pub fn op_mode(&self) -> OpMode {
        self.op_mode
    }

    #[must_use]
    pub fn mode(&self) -> I2cMode {
        self.mode
    }

    #[must_use]
    pub fn rate(&self) -> I2cRate {
        self.rate
    }

    #[must_use]
    pub fn pins(&self) -> PinPair {
        self.current_pins
    }

    #[must_use]
    pub fn bus(&self) -> BusId {
        self.bus
    }

    pub fn target_mut(&mut self) -> &mut I2CT {
        &mut self.target
    }

    fn read_into(&mut self, address: u8, buffer: &mut [u8], stop: StopPolicy) -> Result<(), Error> {
        if buffer.is_empty() {
            return Ok(());
        }
        let received = self.request_from(address, buffer.len(), stop, MicrosDurationU32::from_ticks(0));
        if received != buffer.len() {
            return Err(self.last_error().unwrap_or(Error::Timeout));
        }
        for (dst, src) in buffer.iter_mut().zip(self.rx.as_slice()) {
            *dst = *src;
        }
        self.rx.index = self.rx.len;
        Ok(())
    }

    fn write_ops(
        &mut self,
        address: u8,
        operations: &[Operation<'_>],
        stop: StopPolicy,
    ) -> Result<(), Error> {
        self.begin_transmission(address);
        for operation in operations {
            if let Operation::Write(bytes) = operation {
                if self.write_slice(bytes) != bytes.len() {
                    return Err(Error::BufferOverflow);
                }
            }
        }
        self.end_transmission(stop, MicrosDurationU32::from_ticks(0))
    }

    /// Reads the combined length of `operations` in one request and splits
    /// the bytes across their buffers in order.
    fn read_ops(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
        stop: StopPolicy,
    ) -> Result<(), Error> {
        let total: usize = operations
            .iter()
            .map(|operation| match operation {
                Operation::Read(buffer) => buffer.len(),
                Operation::Write(_) => 0,
            })
            .sum();
        if total == 0 {
            // Nothing to clock in, but a bus held by a preceding write is
            // still released.
            if stop == StopPolicy::Stop && self.regs.control1().is_set(C1::MST) {
                self.stop = StopPolicy::Stop;
                self.settle_then_stop();
            }
            return Ok(());
        }

        let received = self.request_from(address, total, stop, MicrosDurationU32::from_ticks(0));
        if received != total {
            return Err(self.last_error().unwrap_or(Error::Timeout));
        }
        let mut bytes = self.rx.as_slice().iter();
        for operation in operations.iter_mut() {
            if let Operation::Read(buffer) = operation {
                for (dst, src) in buffer.iter_mut().zip(&mut bytes) {
                    *dst = *src;
                }
            }
        }
        self.rx.index = self.rx.len;
        Ok(())
    }

    fn write_from(&mut self, address: u8, bytes: &[u8], stop: StopPolicy) -> Result<(), Error> {
        self.begin_transmission(address);
        if self.write_slice(bytes) != bytes.len() {
            return Err(Error::BufferOverflow);
        }
        self.end_transmission(stop, MicrosDurationU32::from_ticks(0))
    }
}

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger> I2cHardwareCore
    for KinetisI2c<R, P, E, I2CT, L>
{
    type Error = Error;

    fn init(&mut self, config: &I2cConfig) -> Result<(), Self::Error> {
        if config.mode == I2cMode::Slave
            && !config.slave_address.is_some_and(|address| address.is_valid())
        {
            return Err(Error::InvalidAddress);
        }

        self.config = *config;
        self.mode = config.mode;
        self.status.set(I2cStatus::Waiting);
        self.default_timeout = config.default_timeout;

        // Master mode zeroes the match registers so a dynamic reconfiguration
        // cannot leave the bus answering as a slave.
        match config.slave_address {
            Some(address) if config.mode == I2cMode::Slave => {
                let (a1, ra) = address.registers();
                if ra.is_some() {
                    self.regs.write_control2(C2::HDRS::SET + C2::RMEN::SET);
                } else {
                    self.regs.write_control2(C2::HDRS::SET);
                }
                self.regs.write_address(a1);
                self.regs.write_range_address(ra.unwrap_or(0));
                self.target
                    .init(address.address)
                    .map_err(|_| Error::InvalidAddress)?;
            }
            _ => {
                self.regs.write_control2(C2::HDRS::SET);
                self.regs.write_address(0);
                self.regs.write_range_address(0);
            }
        }

        let pins = config
            .pins
            .filter(|pins| config.variant.supports_pins(self.bus, *pins))
            .unwrap_or(config.variant.default_pins(self.bus));
        self.connect_pins(pins, config.pullup);

        // An unreachable rate already logged and programmed its fallback.
        let _ = self.set_rate(config.rate);
        self.set_op_mode(config.op_mode)?;

        match self.mode {
            I2cMode::Master => self.regs.write_control1(C1::IICEN::SET),
            I2cMode::Slave => self.regs.write_control1(C1::IICEN::SET + C1::IICIE::SET),
        }

        crate::log_debug!(
            self.logger,
            "i2c{}: {:?} on pins {}/{} at {:?}",
            self.bus.index(),
            self.mode,
            pins.scl(),
            pins.sda(),
            self.rate
        );
        Ok(())
    }

    fn configure_timing(&mut self, rate: I2cRate) -> Result<I2cRate, Self::Error> {
        self.set_rate(rate)
    }

    fn handle_interrupt(&mut self) {
        let status = self.regs.status();

        if status.is_set(S::ARBL) && self.status.get().is_master_active() {
            // Losing arbitration clears MST, so this no longer looks like a
            // master interrupt.
            self.isr_arbitration_lost();
            if !status.is_set(S::IAAS) {
                return;
            }
        }

        let control = self.regs.control1();
        if control.is_set(C1::MST) {
            if control.is_set(C1::TX) {
                self.isr_master_transmit(status);
            } else {
                self.isr_master_receive(status);
            }
        } else {
            let filter = self.regs.filter();
            self.isr_slave(status, control, filter);
        }
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        self.reset_bus();
        Ok(())
    }
}

impl<R: I2cRegisters, P: BusPins, E: Platform, I2CT: I2CTarget, L: Logger>
    I2cMaster<SevenBitAddress> for KinetisI2c<R, P, E, I2CT, L>
{
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_from(addr, bytes, StopPolicy::Stop)
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.read_into(addr, buffer, StopPolicy::Stop)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.write_from(addr, bytes, StopPolicy::NoStop)?;
        self.read_into(addr, buffer, StopPolicy::Stop)
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        // Adjacent operations of one kind share a single START and address
        // byte; only a change of direction gets a repeated START.
        let mut groups = ops_slice
            .chunk_by_mut(|a, b| core::mem::discriminant(a) == core::mem::discriminant(b))
            .peekable();
        while let Some(group) = groups.next() {
            let stop = if groups.peek().is_some() {
                StopPolicy::NoStop
            } else {
                StopPolicy::Stop
            };
            match group.first() {
                Some(Operation::Write(_)) => self.write_ops(addr, group, stop)?,
                Some(Operation::Read(_)) => self.read_ops(addr, group, stop)?,
                None => {}
            }
        }
        Ok(())
    }
}
