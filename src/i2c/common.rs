// Licensed under the Apache-2.0 license

//! Common types for the Kinetis I2C driver modules.
//!
//! This module provides the shared definitions used across the driver: bus and
//! chip identification, configuration, transfer status, error counters and the
//! error type surfaced by the public API.

use crate::i2c::rate::I2cRate;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use fugit::MicrosDurationU32;

/// Number of bus instances a context registry can hold.
pub const BUS_COUNT: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BusId {
    I2c0 = 0,
    I2c1 = 1,
}

impl BusId {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Supported microcontroller families.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChipVariant {
    /// MK20DX128, single bus.
    Teensy30,
    /// MK20DX256, two buses.
    Teensy31,
    /// MKL26Z64, two buses with native slave STOP detection.
    TeensyLc,
}

impl ChipVariant {
    #[must_use]
    pub const fn bus_count(self) -> usize {
        match self {
            ChipVariant::Teensy30 => 1,
            ChipVariant::Teensy31 | ChipVariant::TeensyLc => 2,
        }
    }

    /// Whether the peripheral raises STOPF in slave mode. Variants without it
    /// fall back to SDA rising-edge detection.
    #[must_use]
    pub const fn native_stop_detect(self) -> bool {
        matches!(self, ChipVariant::TeensyLc)
    }

    #[must_use]
    pub const fn irq_number(self, bus: BusId) -> u16 {
        match (self, bus) {
            (ChipVariant::TeensyLc, BusId::I2c0) => 8,
            (ChipVariant::TeensyLc, BusId::I2c1) => 9,
            (_, BusId::I2c0) => 24,
            (_, BusId::I2c1) => 25,
        }
    }

    #[must_use]
    pub const fn default_pins(self, bus: BusId) -> PinPair {
        match (self, bus) {
            (_, BusId::I2c0) => PinPair::Pins18_19,
            (ChipVariant::TeensyLc, BusId::I2c1) => PinPair::Pins22_23,
            (_, BusId::I2c1) => PinPair::Pins29_30,
        }
    }

    #[must_use]
    pub const fn supports_pins(self, bus: BusId, pins: PinPair) -> bool {
        match (bus, pins) {
            (BusId::I2c0, PinPair::Pins18_19 | PinPair::Pins16_17) => true,
            (BusId::I2c1, PinPair::Pins22_23) => matches!(self, ChipVariant::TeensyLc),
            (BusId::I2c1, PinPair::Pins29_30 | PinPair::Pins26_31) => {
                matches!(self, ChipVariant::Teensy31)
            }
            _ => false,
        }
    }

    /// The LC routes bus 1 (pins 22/23) from the core clock instead of the bus clock.
    #[must_use]
    pub const fn uses_core_clock(self, pins: PinPair) -> bool {
        matches!(
            (self, pins),
            (ChipVariant::TeensyLc, PinPair::Pins22_23)
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cMode {
    Master,
    Slave,
}

/// Execution strategy for a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpMode {
    /// Busy-poll the status flags from the calling context.
    Immediate,
    /// Arm the transfer and let the interrupt handler drive it.
    Interrupt,
    /// Interrupt-driven, with the bulk of long transfers moved by DMA.
    Dma,
}

/// Whether a master transfer releases the bus when it completes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopPolicy {
    Stop,
    NoStop,
}

/// SCL/SDA pin pairs, named by Teensy pin numbers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PinPair {
    /// SCL 19, SDA 18.
    Pins18_19,
    /// SCL 16, SDA 17.
    Pins16_17,
    /// SCL 22, SDA 23 (LC only).
    Pins22_23,
    /// SCL 29, SDA 30 (3.1 only).
    Pins29_30,
    /// SCL 26, SDA 31 (3.1 only).
    Pins26_31,
}

impl PinPair {
    #[must_use]
    pub const fn scl(self) -> u8 {
        match self {
            PinPair::Pins18_19 => 19,
            PinPair::Pins16_17 => 16,
            PinPair::Pins22_23 => 22,
            PinPair::Pins29_30 => 29,
            PinPair::Pins26_31 => 26,
        }
    }

    #[must_use]
    pub const fn sda(self) -> u8 {
        match self {
            PinPair::Pins18_19 => 18,
            PinPair::Pins16_17 => 17,
            PinPair::Pins22_23 => 23,
            PinPair::Pins29_30 => 30,
            PinPair::Pins26_31 => 31,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pullup {
    External,
    Internal,
}

/// Slave address match configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveAddress {
    pub address: u8,
    /// Second address of an inclusive match range, in either order.
    pub range_end: Option<u8>,
}

impl SlaveAddress {
    /// Values for the A1 and RA registers, lower address in A1.
    #[must_use]
    pub fn registers(&self) -> (u8, Option<u8>) {
        match self.range_end {
            Some(end) => {
                let (low, high) = if self.address < end {
                    (self.address, end)
                } else {
                    (end, self.address)
                };
                (low << 1, Some(high << 1))
            }
            None => (self.address << 1, None),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.address <= 0x7F && self.range_end.map_or(true, |end| end <= 0x7F)
    }
}

/// Transfer status.
///
/// `Waiting` and the error states are terminal, the remainder are in progress.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cStatus {
    Waiting = 0,
    Sending,
    SendingAddress,
    Receiving,
    Timeout,
    AddressNak,
    DataNak,
    ArbitrationLost,
    BufferOverflow,
    NotAcquired,
    DmaError,
    SlaveTransmit,
    SlaveReceive,
}

impl I2cStatus {
    const ALL: [I2cStatus; 13] = [
        I2cStatus::Waiting,
        I2cStatus::Sending,
        I2cStatus::SendingAddress,
        I2cStatus::Receiving,
        I2cStatus::Timeout,
        I2cStatus::AddressNak,
        I2cStatus::DataNak,
        I2cStatus::ArbitrationLost,
        I2cStatus::BufferOverflow,
        I2cStatus::NotAcquired,
        I2cStatus::DmaError,
        I2cStatus::SlaveTransmit,
        I2cStatus::SlaveReceive,
    ];

    fn from_raw(raw: u8) -> Self {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .unwrap_or(I2cStatus::Waiting)
    }

    /// True once a master transfer has reached a terminal state.
    #[must_use]
    pub const fn is_done(self) -> bool {
        !matches!(
            self,
            I2cStatus::Sending
                | I2cStatus::SendingAddress
                | I2cStatus::Receiving
                | I2cStatus::SlaveTransmit
                | I2cStatus::SlaveReceive
        )
    }

    /// True for the master transfer states that a timeout may interrupt.
    #[must_use]
    pub const fn is_master_active(self) -> bool {
        matches!(
            self,
            I2cStatus::Sending | I2cStatus::SendingAddress | I2cStatus::Receiving
        )
    }

    #[must_use]
    pub const fn error(self) -> Option<Error> {
        match self {
            I2cStatus::Timeout => Some(Error::Timeout),
            I2cStatus::AddressNak => Some(Error::AddressNak),
            I2cStatus::DataNak => Some(Error::DataNak),
            I2cStatus::ArbitrationLost => Some(Error::ArbitrationLost),
            I2cStatus::BufferOverflow => Some(Error::BufferOverflow),
            I2cStatus::NotAcquired => Some(Error::BusNotAcquired),
            I2cStatus::DmaError => Some(Error::DmaError),
            _ => None,
        }
    }
}

/// Status shared between mainline code and the interrupt handler.
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    pub(crate) const fn new(status: I2cStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn get(&self) -> I2cStatus {
        I2cStatus::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, status: I2cStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}

/// DMA overlay phase of a master transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DmaState {
    Off = 0,
    /// Address byte in flight, DMA armed but not yet enabled.
    AddressPhase,
    /// DMA moving the body of the transfer.
    BulkPhase,
    /// DMA done, final byte handled by the interrupt path.
    LastBytePhase,
}

#[derive(Debug)]
pub(crate) struct DmaStateCell(AtomicU8);

impl DmaStateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(DmaState::Off as u8))
    }

    pub(crate) fn get(&self) -> DmaState {
        match self.0.load(Ordering::Acquire) {
            1 => DmaState::AddressPhase,
            2 => DmaState::BulkPhase,
            3 => DmaState::LastBytePhase,
            _ => DmaState::Off,
        }
    }

    pub(crate) fn set(&self, state: DmaState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Error counters kept per bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCounter {
    ResetBus = 0,
    Timeout,
    AddressNak,
    DataNak,
    ArbitrationLost,
    NotAcquired,
    DmaError,
}

/// Saturating counters written by the state machine and read or cleared by
/// mainline code.
#[derive(Debug, Default)]
pub(crate) struct ErrorCounters {
    counts: [AtomicU32; 7],
}

impl ErrorCounters {
    pub(crate) fn increment(&self, counter: ErrorCounter) {
        if let Some(count) = self.counts.get(counter as usize) {
            // Single writer, so load/store is enough and works on ARMv6-M.
            let value = count.load(Ordering::Relaxed);
            count.store(value.saturating_add(1), Ordering::Relaxed);
        }
    }

    pub(crate) fn get(&self, counter: ErrorCounter) -> u32 {
        self.counts
            .get(counter as usize)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    pub(crate) fn zero(&self, counter: ErrorCounter) {
        if let Some(count) = self.counts.get(counter as usize) {
            count.store(0, Ordering::Relaxed);
        }
    }
}

/// Optional master completion notifications, called from the interrupt path.
#[derive(Copy, Clone, Debug, Default)]
pub struct MasterCallbacks {
    pub on_transmit_done: Option<fn()>,
    pub on_request_done: Option<fn()>,
    pub on_error: Option<fn(I2cStatus)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Timeout,
    AddressNak,
    DataNak,
    ArbitrationLost,
    /// Transmit buffer overflowed or the request exceeds the receive buffer.
    BufferOverflow,
    BusNotAcquired,
    DmaError,
    /// Reconfiguration attempted while the bus is busy.
    Busy,
    /// The requested rate is not reachable; the fallback divider was applied.
    UnsupportedRate,
    InvalidAddress,
    SystemControl,
}

impl Error {
    /// Stable numeric code: 1 overflow, 2 address NAK, 3 data NAK, 4 other.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Error::BufferOverflow => 1,
            Error::AddressNak => 2,
            Error::DataNak => 3,
            _ => 4,
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::AddressNak => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::DataNak => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::BufferOverflow => ErrorKind::Overrun,
            Error::Timeout | Error::BusNotAcquired | Error::DmaError => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::Timeout => embedded_io::ErrorKind::TimedOut,
            Error::InvalidAddress => embedded_io::ErrorKind::InvalidInput,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct I2cConfig {
    pub mode: I2cMode,
    pub slave_address: Option<SlaveAddress>,
    /// `None` selects the default pair for the bus and variant.
    pub pins: Option<PinPair>,
    pub pullup: Pullup,
    pub rate: I2cRate,
    pub op_mode: OpMode,
    /// Zero waits forever.
    pub default_timeout: MicrosDurationU32,
    /// Reset the bus and retry once when acquisition times out.
    pub auto_retry: bool,
    pub variant: ChipVariant,
    pub bus_clock_hz: u32,
    pub core_clock_hz: u32,
    /// Delay between the final receive byte and STOP.
    pub stop_settle: MicrosDurationU32,
}

pub struct I2cConfigBuilder {
    mode: I2cMode,
    slave_address: Option<SlaveAddress>,
    pins: Option<PinPair>,
    pullup: Pullup,
    rate: I2cRate,
    op_mode: OpMode,
    default_timeout: MicrosDurationU32,
    auto_retry: bool,
    variant: ChipVariant,
    bus_clock_hz: u32,
    core_clock_hz: u32,
    stop_settle: MicrosDurationU32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: I2cMode::Master,
            slave_address: None,
            pins: None,
            pullup: Pullup::External,
            rate: I2cRate::Rate100,
            op_mode: OpMode::Interrupt,
            default_timeout: MicrosDurationU32::from_ticks(0),
            auto_retry: false,
            variant: ChipVariant::Teensy31,
            bus_clock_hz: 48_000_000,
            core_clock_hz: 96_000_000,
            stop_settle: MicrosDurationU32::from_ticks(1),
        }
    }
    #[must_use]
    pub fn master(mut self) -> Self {
        self.mode = I2cMode::Master;
        self.slave_address = None;
        self
    }
    #[must_use]
    pub fn slave(mut self, address: u8) -> Self {
        self.mode = I2cMode::Slave;
        self.slave_address = Some(SlaveAddress {
            address,
            range_end: None,
        });
        self
    }
    #[must_use]
    pub fn slave_range(mut self, first: u8, last: u8) -> Self {
        self.mode = I2cMode::Slave;
        self.slave_address = Some(SlaveAddress {
            address: first,
            range_end: Some(last),
        });
        self
    }
    #[must_use]
    pub fn pins(mut self, pins: PinPair) -> Self {
        self.pins = Some(pins);
        self
    }
    #[must_use]
    pub fn pullup(mut self, pullup: Pullup) -> Self {
        self.pullup = pullup;
        self
    }
    #[must_use]
    pub fn rate(mut self, rate: I2cRate) -> Self {
        self.rate = rate;
        self
    }
    #[must_use]
    pub fn frequency(mut self, hz: u32) -> Self {
        self.rate = I2cRate::from_frequency(hz);
        self
    }
    #[must_use]
    pub fn op_mode(mut self, op_mode: OpMode) -> Self {
        self.op_mode = op_mode;
        self
    }
    #[must_use]
    pub fn default_timeout(mut self, timeout: MicrosDurationU32) -> Self {
        self.default_timeout = timeout;
        self
    }
    #[must_use]
    pub fn auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = enabled;
        self
    }
    #[must_use]
    pub fn variant(mut self, variant: ChipVariant) -> Self {
        self.variant = variant;
        self
    }
    #[must_use]
    pub fn bus_clock_hz(mut self, hz: u32) -> Self {
        self.bus_clock_hz = hz;
        self
    }
    #[must_use]
    pub fn core_clock_hz(mut self, hz: u32) -> Self {
        self.core_clock_hz = hz;
        self
    }
    #[must_use]
    pub fn stop_settle(mut self, delay: MicrosDurationU32) -> Self {
        self.stop_settle = delay;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            mode: self.mode,
            slave_address: self.slave_address,
            pins: self.pins,
            pullup: self.pullup,
            rate: self.rate,
            op_mode: self.op_mode,
            default_timeout: self.default_timeout,
            auto_retry: self.auto_retry,
            variant: self.variant,
            bus_clock_hz: self.bus_clock_hz,
            core_clock_hz: self.core_clock_hz,
            stop_settle: self.stop_settle,
        }
    }
}
