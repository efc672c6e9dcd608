// Licensed under the Apache-2.0 license

//! Simulated Kinetis I2C peripheral for unit tests.
//!
//! One [`Sim`] owns the state of a peripheral, its pins, a platform (clock,
//! delays, NVIC priorities, one DMA channel) and the devices on the bus.
//! Bytes move only when the test lets them: polled transfers advance the
//! bus whenever S is read with interrupts disabled, interrupt driven ones
//! advance through [`Sim::pump`], which plays the part of the NVIC.
//!
//! A remote master can be driven with the `external_*` helpers to exercise
//! the slave role.

use crate::common::tests::RecordingLogger;
use crate::i2c::common::{BusId, I2cConfig, PinPair, Pullup};
use crate::i2c::hardware_instantiation::InterruptEntry;
use crate::i2c::kinetis_i2c::KinetisI2c;
use crate::i2c::registers::{C1Value, FltValue, I2cRegisters, StatusValue, C1, C2, FLT, S};
use crate::i2c::traits::{
    BusPins, DmaAllocator, DmaChannel, I2cHardwareCore, InterruptPriority, MicrosClock,
    MicrosInstant,
};
use embedded_hal::delay::DelayNs;
use proposed_traits::i2c_target::{
    I2CCoreTarget, ReadTarget, RegisterAccess, WriteReadTarget, WriteTarget,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;
use tock_registers::fields::FieldValue;
use tock_registers::LocalRegisterCopy;

const C1_IICIE: u8 = 0x40;
const C1_MST: u8 = 0x20;
const C1_TX: u8 = 0x10;
const C1_TXAK: u8 = 0x08;
const C1_RSTA: u8 = 0x04;
const C1_DMAEN: u8 = 0x01;

const S_TCF: u8 = 0x80;
const S_IAAS: u8 = 0x40;
const S_BUSY: u8 = 0x20;
const S_ARBL: u8 = 0x10;
const S_SRW: u8 = 0x04;
const S_IICIF: u8 = 0x02;
const S_RXAK: u8 = 0x01;

const C2_RMEN: u8 = 0x08;

const FLT_STOPF: u8 = 0x40;
const FLT_STOPIE: u8 = 0x20;

/// Default NVIC priority of a device interrupt on Teensy.
const DEFAULT_IRQ_PRIORITY: u8 = 128;

/// Bus activity as seen by a logic analyser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Start,
    RepeatedStart,
    Stop,
    Address { address: u8, read: bool, acked: bool },
    /// Byte written by this bus as master.
    Data { byte: u8, acked: bool },
    /// This bus, as master, acknowledged a received byte.
    MasterAck,
    MasterNak,
    ArbitrationLost,
}

/// Register-pointer style remote slave: the first byte of a write sets the
/// pointer, further bytes are stored, reads return memory at the pointer.
#[derive(Clone, Debug)]
pub(crate) struct Device {
    pub(crate) address: u8,
    pub(crate) memory: [u8; 256],
    pub(crate) pointer: u8,
    pub(crate) nak_address: bool,
    /// Data bytes acknowledged in a write before the device starts NAKing.
    pub(crate) nak_after: Option<usize>,
    first_write: bool,
    written: usize,
}

impl Device {
    fn new(address: u8) -> Self {
        Self {
            address,
            memory: [0; 256],
            pointer: 0,
            nak_address: false,
            nak_after: None,
            first_write: true,
            written: 0,
        }
    }

    fn begin(&mut self) {
        self.first_write = true;
        self.written = 0;
    }

    fn write(&mut self, byte: u8) -> bool {
        if self.nak_after.is_some_and(|limit| self.written >= limit) {
            return false;
        }
        if self.first_write {
            self.pointer = byte;
            self.first_write = false;
        } else {
            self.memory[usize::from(self.pointer)] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.written += 1;
        true
    }

    fn read(&mut self) -> u8 {
        let byte = self.memory[usize::from(self.pointer)];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Transfer {
    Write,
    Read,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum InFlight {
    Write(u8),
    Read,
}

#[derive(Default)]
struct DmaSim {
    allocated: bool,
    source: Option<*const u8>,
    destination: Option<*mut u8>,
    remaining: usize,
    enabled: bool,
    complete: bool,
    interrupt: bool,
    error: bool,
    requests: usize,
    fail_at_request: Option<usize>,
}

pub(crate) struct SimState {
    c1: u8,
    s: u8,
    d: u8,
    c2: u8,
    flt: u8,
    a1: u8,
    ra: u8,
    f: u8,

    owner: bool,
    bus_busy: bool,
    expect_address: bool,
    in_flight: Option<InFlight>,
    transfer: Option<(usize, Transfer)>,
    slave_tx: Option<u8>,

    stall: bool,
    always_busy: bool,
    claim_fails: bool,
    lose_arbitration: bool,

    devices: Vec<Device>,
    events: Vec<Event>,

    connected: Option<(PinPair, Pullup)>,
    released: Vec<PinPair>,
    sda_stuck_clocks: u32,
    scl_pulses: u32,
    sda_armed: bool,
    sda_arms: u32,

    now_us: u32,
    spare_ns: u32,
    exec_priority: u16,
    irq_priorities: HashMap<u16, u8>,
    priority_writes: Vec<(u16, u8)>,
    enabled_irqs: Vec<u16>,
    dma_available: bool,
    dma_releases: u32,
    dma: DmaSim,
}

impl SimState {
    fn new() -> Self {
        Self {
            c1: 0,
            s: 0,
            d: 0,
            c2: 0,
            flt: 0,
            a1: 0,
            ra: 0,
            f: 0,
            owner: false,
            bus_busy: false,
            expect_address: false,
            in_flight: None,
            transfer: None,
            slave_tx: None,
            stall: false,
            always_busy: false,
            claim_fails: false,
            lose_arbitration: false,
            devices: Vec::new(),
            events: Vec::new(),
            connected: None,
            released: Vec::new(),
            sda_stuck_clocks: 0,
            scl_pulses: 0,
            sda_armed: false,
            sda_arms: 0,
            now_us: 0,
            spare_ns: 0,
            exec_priority: 256,
            irq_priorities: HashMap::new(),
            priority_writes: Vec::new(),
            enabled_irqs: Vec::new(),
            dma_available: true,
            dma_releases: 0,
            dma: DmaSim::default(),
        }
    }

    fn write_c1(&mut self, value: u8) {
        let was_master = self.c1 & C1_MST != 0;
        let mut value = value;
        // Any C1 write acknowledges an address match.
        self.s &= !S_IAAS;

        if !was_master && value & C1_MST != 0 {
            if self.claim_fails || self.line_busy() {
                value &= !C1_MST;
            } else {
                self.owner = true;
                self.bus_busy = true;
                self.expect_address = true;
                self.events.push(Event::Start);
            }
        } else if was_master && value & C1_MST == 0 {
            if self.owner {
                self.stop();
            }
        } else if was_master && value & C1_RSTA != 0 {
            self.events.push(Event::RepeatedStart);
            self.expect_address = true;
            self.in_flight = None;
            self.transfer = None;
        }
        self.c1 = value & !C1_RSTA;
    }

    /// A slave holding SDA low also keeps the bus busy.
    fn line_busy(&self) -> bool {
        self.bus_busy || self.always_busy || self.sda_stuck_clocks > 0
    }

    fn stop(&mut self) {
        self.events.push(Event::Stop);
        self.owner = false;
        self.bus_busy = false;
        self.in_flight = None;
        self.transfer = None;
    }

    fn status(&mut self) -> u8 {
        if self.c1 & C1_IICIE == 0 {
            self.advance();
        }
        let mut s = self.s & !S_BUSY;
        if self.line_busy() {
            s |= S_BUSY;
        }
        s
    }

    fn read_d(&mut self) -> u8 {
        let value = self.d;
        self.s &= !S_TCF;
        if self.owner
            && self.c1 & C1_MST != 0
            && self.c1 & C1_TX == 0
            && self.in_flight.is_none()
        {
            self.in_flight = Some(InFlight::Read);
        }
        value
    }

    fn write_d(&mut self, byte: u8) {
        self.s &= !S_TCF;
        self.d = byte;
        if self.c1 & C1_TX == 0 {
            return;
        }
        if self.owner && self.c1 & C1_MST != 0 {
            self.in_flight = Some(InFlight::Write(byte));
        } else if self.c1 & C1_MST == 0 {
            self.slave_tx = Some(byte);
        }
    }

    fn write_flt(&mut self, value: u8) {
        // STOPF is write-one-to-clear.
        let stopf = if value & FLT_STOPF != 0 {
            0
        } else {
            self.flt & FLT_STOPF
        };
        self.flt = (value & !FLT_STOPF) | stopf;
    }

    /// Completes the byte on the wire, if any.
    fn advance(&mut self) {
        if self.stall {
            return;
        }
        let Some(flight) = self.in_flight.take() else {
            return;
        };
        match flight {
            InFlight::Write(byte) => {
                if !self.complete_write(byte) {
                    return;
                }
            }
            InFlight::Read => self.complete_read(),
        }
        self.s |= S_TCF | S_IICIF;
        if self.c1 & C1_DMAEN != 0 {
            self.dma_request();
        }
    }

    fn complete_write(&mut self, byte: u8) -> bool {
        if self.lose_arbitration {
            self.lose_arbitration = false;
            self.s |= S_ARBL | S_IICIF;
            self.c1 &= !C1_MST;
            self.owner = false;
            self.bus_busy = false;
            self.transfer = None;
            self.events.push(Event::ArbitrationLost);
            return false;
        }

        let acked = if self.expect_address {
            self.expect_address = false;
            let address = byte >> 1;
            let read = byte & 1 != 0;
            let index = self
                .devices
                .iter()
                .position(|device| device.address == address && !device.nak_address);
            self.transfer = index.map(|index| {
                self.devices[index].begin();
                (index, if read { Transfer::Read } else { Transfer::Write })
            });
            self.events.push(Event::Address {
                address,
                read,
                acked: index.is_some(),
            });
            index.is_some()
        } else {
            let acked = match self.transfer {
                Some((index, Transfer::Write)) => self.devices[index].write(byte),
                _ => false,
            };
            self.events.push(Event::Data { byte, acked });
            acked
        };

        if acked {
            self.s &= !S_RXAK;
        } else {
            self.s |= S_RXAK;
        }
        true
    }

    fn complete_read(&mut self) {
        self.d = match self.transfer {
            Some((index, Transfer::Read)) => self.devices[index].read(),
            _ => 0xFF,
        };
        if self.c1 & C1_TXAK == 0 {
            self.events.push(Event::MasterAck);
        } else {
            self.events.push(Event::MasterNak);
        }
    }

    fn dma_request(&mut self) {
        if !self.dma.enabled {
            return;
        }
        if self.dma.fail_at_request == Some(self.dma.requests) {
            self.dma.fail_at_request = None;
            self.dma.error = true;
            self.dma.interrupt = true;
            self.dma.enabled = false;
            return;
        }
        self.dma.requests += 1;

        if let Some(source) = self.dma.source {
            // SAFETY: configured by the driver over its live transmit buffer.
            let byte = unsafe { *source };
            self.dma.source = Some(unsafe { source.add(1) });
            self.s &= !S_TCF;
            self.in_flight = Some(InFlight::Write(byte));
        } else if let Some(destination) = self.dma.destination {
            // SAFETY: configured by the driver over its live receive buffer.
            unsafe { *destination = self.d };
            self.dma.destination = Some(unsafe { destination.add(1) });
            self.s &= !S_TCF;
            self.in_flight = Some(InFlight::Read);
        }

        self.dma.remaining -= 1;
        if self.dma.remaining == 0 {
            self.dma.complete = true;
            self.dma.interrupt = true;
            self.dma.enabled = false;
        }
    }

    fn slave_matches(&self, address: u8) -> bool {
        if self.c1 & C1_MST != 0 {
            return false;
        }
        if self.c2 & C2_RMEN != 0 {
            (self.a1 >> 1..=self.ra >> 1).contains(&address)
        } else {
            address == self.a1 >> 1
        }
    }

    fn interrupt_pending(&self) -> bool {
        (self.c1 & C1_IICIE != 0 && self.s & S_IICIF != 0)
            || (self.flt & FLT_STOPIE != 0 && self.flt & FLT_STOPF != 0)
            || self.dma.interrupt
    }
}

/// Handle to one simulated bus.
#[derive(Clone)]
pub(crate) struct Sim {
    state: Rc<RefCell<SimState>>,
}

pub(crate) type SimBus =
    KinetisI2c<SimRegisters, SimPins, MockPlatform, SimTarget, RecordingLogger>;

impl Sim {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::new())),
        }
    }

    pub(crate) fn registers(&self) -> SimRegisters {
        SimRegisters {
            state: Rc::clone(&self.state),
        }
    }

    pub(crate) fn pins(&self) -> SimPins {
        SimPins {
            state: Rc::clone(&self.state),
        }
    }

    pub(crate) fn platform(&self) -> MockPlatform {
        MockPlatform {
            state: Rc::clone(&self.state),
        }
    }

    /// Unconfigured bus 0 context.
    pub(crate) fn bus(&self, config: I2cConfig) -> SimBus {
        KinetisI2c::new(
            BusId::I2c0,
            self.registers(),
            self.pins(),
            self.platform(),
            SimTarget::default(),
            RecordingLogger::default(),
            config,
        )
    }

    /// Bus 0 context with `config` applied.
    pub(crate) fn ready_bus(&self, config: I2cConfig) -> SimBus {
        let mut bus = self.bus(config);
        bus.init(&config).unwrap();
        bus
    }

    pub(crate) fn add_device(&self, address: u8) {
        self.state.borrow_mut().devices.push(Device::new(address));
    }

    pub(crate) fn with_device<F: FnOnce(&mut Device)>(&self, address: u8, f: F) {
        let mut state = self.state.borrow_mut();
        let device = state
            .devices
            .iter_mut()
            .find(|device| device.address == address)
            .unwrap();
        f(device);
    }

    pub(crate) fn device_memory_write(&self, address: u8, offset: u8, bytes: &[u8]) {
        self.with_device(address, |device| {
            let start = usize::from(offset);
            device.memory[start..start + bytes.len()].copy_from_slice(bytes);
        });
    }

    pub(crate) fn device_memory(&self, address: u8) -> [u8; 256] {
        let mut memory = [0; 256];
        self.with_device(address, |device| memory = device.memory);
        memory
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub(crate) fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub(crate) fn set_stall(&self, stall: bool) {
        self.state.borrow_mut().stall = stall;
    }

    pub(crate) fn set_always_busy(&self, busy: bool) {
        self.state.borrow_mut().always_busy = busy;
    }

    pub(crate) fn set_claim_fails(&self, fails: bool) {
        self.state.borrow_mut().claim_fails = fails;
    }

    pub(crate) fn lose_arbitration_on_next_byte(&self) {
        self.state.borrow_mut().lose_arbitration = true;
    }

    /// Makes the DMA channel fail instead of serving request number `request`.
    pub(crate) fn fail_dma_at_request(&self, request: usize) {
        self.state.borrow_mut().dma.fail_at_request = Some(request);
    }

    pub(crate) fn set_dma_available(&self, available: bool) {
        self.state.borrow_mut().dma_available = available;
    }

    pub(crate) fn dma_allocated(&self) -> bool {
        self.state.borrow().dma.allocated
    }

    pub(crate) fn dma_releases(&self) -> u32 {
        self.state.borrow().dma_releases
    }

    pub(crate) fn dma_requests(&self) -> usize {
        self.state.borrow().dma.requests
    }

    pub(crate) fn set_execution_priority(&self, priority: u16) {
        self.state.borrow_mut().exec_priority = priority;
    }

    pub(crate) fn set_irq_priority(&self, irq: u16, priority: u8) {
        self.state.borrow_mut().irq_priorities.insert(irq, priority);
    }

    pub(crate) fn priority_writes(&self) -> Vec<(u16, u8)> {
        self.state.borrow().priority_writes.clone()
    }

    pub(crate) fn enabled_irqs(&self) -> Vec<u16> {
        self.state.borrow().enabled_irqs.clone()
    }

    pub(crate) fn now_us(&self) -> u32 {
        self.state.borrow().now_us
    }

    pub(crate) fn hold_sda_low(&self, clocks: u32) {
        self.state.borrow_mut().sda_stuck_clocks = clocks;
    }

    pub(crate) fn scl_pulses(&self) -> u32 {
        self.state.borrow().scl_pulses
    }

    pub(crate) fn sda_armed(&self) -> bool {
        self.state.borrow().sda_armed
    }

    pub(crate) fn sda_arms(&self) -> u32 {
        self.state.borrow().sda_arms
    }

    pub(crate) fn connected(&self) -> Option<(PinPair, Pullup)> {
        self.state.borrow().connected
    }

    pub(crate) fn released(&self) -> Vec<PinPair> {
        self.state.borrow().released.clone()
    }

    pub(crate) fn c1(&self) -> u8 {
        self.state.borrow().c1
    }

    pub(crate) fn c2(&self) -> u8 {
        self.state.borrow().c2
    }

    pub(crate) fn a1(&self) -> u8 {
        self.state.borrow().a1
    }

    pub(crate) fn ra(&self) -> u8 {
        self.state.borrow().ra
    }

    pub(crate) fn divider(&self) -> u8 {
        self.state.borrow().f
    }

    pub(crate) fn flt(&self) -> u8 {
        self.state.borrow().flt
    }

    pub(crate) fn bus_busy(&self) -> bool {
        self.state.borrow().bus_busy
    }

    /// Delivers interrupts to `context` until the bus goes quiet.
    pub(crate) fn pump<T: InterruptEntry>(&self, context: &mut T) {
        for _ in 0..100_000 {
            let pending = {
                let mut state = self.state.borrow_mut();
                state.advance();
                state.interrupt_pending()
            };
            if !pending {
                return;
            }
            context.bus_interrupt();
        }
        panic!("interrupt storm");
    }

    fn deliver<T: InterruptEntry>(&self, context: &mut T) {
        let pending = self.state.borrow().interrupt_pending();
        if pending {
            context.bus_interrupt();
        }
    }

    /// A remote master sends START (or repeated START) and `address`.
    /// Returns whether this bus acknowledged.
    pub(crate) fn external_start<T: InterruptEntry>(
        &self,
        context: &mut T,
        address: u8,
        read: bool,
    ) -> bool {
        let matched = {
            let mut state = self.state.borrow_mut();
            state.bus_busy = true;
            let matched = state.slave_matches(address);
            if matched {
                state.s |= S_IAAS | S_IICIF | S_TCF;
                if read {
                    state.s |= S_SRW;
                } else {
                    state.s &= !S_SRW;
                }
                state.d = (address << 1) | u8::from(read);
            }
            matched
        };
        if matched {
            self.deliver(context);
        }
        matched
    }

    /// The remote master writes one data byte.
    pub(crate) fn external_write_byte<T: InterruptEntry>(&self, context: &mut T, byte: u8) {
        {
            let mut state = self.state.borrow_mut();
            state.d = byte;
            state.s |= S_IICIF | S_TCF;
        }
        self.deliver(context);
    }

    /// The remote master reads one byte and ACKs or NAKs it.
    pub(crate) fn external_read_byte<T: InterruptEntry>(&self, context: &mut T, ack: bool) -> u8 {
        let byte = {
            let mut state = self.state.borrow_mut();
            let byte = state.slave_tx.take().unwrap_or(0xFF);
            state.s |= S_IICIF | S_TCF;
            if ack {
                state.s &= !S_RXAK;
            } else {
                state.s |= S_RXAK;
            }
            byte
        };
        self.deliver(context);
        byte
    }

    /// The remote master sends STOP. The LC flags STOPF; the other parts
    /// only see SDA rise.
    pub(crate) fn external_stop<T: InterruptEntry>(&self, context: &mut T) {
        let edge = {
            let mut state = self.state.borrow_mut();
            state.bus_busy = false;
            state.flt |= FLT_STOPF;
            state.sda_armed
        };
        self.deliver(context);
        if edge {
            context.sda_rising();
        }
    }

    /// SDA rises during a data bit while the bus is busy.
    pub(crate) fn sda_glitch<T: InterruptEntry>(&self, context: &mut T) {
        let edge = self.state.borrow().sda_armed;
        if edge {
            context.sda_rising();
        }
    }
}

pub(crate) struct SimRegisters {
    state: Rc<RefCell<SimState>>,
}

impl I2cRegisters for SimRegisters {
    fn control1(&self) -> C1Value {
        LocalRegisterCopy::new(self.state.borrow().c1)
    }

    fn write_control1(&self, value: FieldValue<u8, C1::Register>) {
        self.state.borrow_mut().write_c1(value.modify(0));
    }

    fn modify_control1(&self, value: FieldValue<u8, C1::Register>) {
        let mut state = self.state.borrow_mut();
        let raw = value.modify(state.c1);
        state.write_c1(raw);
    }

    fn status(&self) -> StatusValue {
        LocalRegisterCopy::new(self.state.borrow_mut().status())
    }

    fn clear_status(&self, flags: FieldValue<u8, S::Register>) {
        let raw = flags.modify(0);
        self.state.borrow_mut().s &= !(raw & (S_IICIF | S_ARBL));
    }

    fn read_data(&self) -> u8 {
        self.state.borrow_mut().read_d()
    }

    fn write_data(&self, byte: u8) {
        self.state.borrow_mut().write_d(byte);
    }

    fn write_control2(&self, value: FieldValue<u8, C2::Register>) {
        self.state.borrow_mut().c2 = value.modify(0);
    }

    fn filter(&self) -> FltValue {
        LocalRegisterCopy::new(self.state.borrow().flt)
    }

    fn modify_filter(&self, value: FieldValue<u8, FLT::Register>) {
        let mut state = self.state.borrow_mut();
        let raw = value.modify(state.flt);
        state.write_flt(raw);
    }

    fn clear_stop_flag(&self) {
        let mut state = self.state.borrow_mut();
        let raw = state.flt | FLT_STOPF;
        state.write_flt(raw);
    }

    fn write_address(&self, a1: u8) {
        self.state.borrow_mut().a1 = a1;
    }

    fn write_range_address(&self, ra: u8) {
        self.state.borrow_mut().ra = ra;
    }

    fn write_divider(&self, f: u8) {
        self.state.borrow_mut().f = f;
    }

    fn data_register_address(&self) -> usize {
        0x4006_6004
    }
}

pub(crate) struct SimPins {
    state: Rc<RefCell<SimState>>,
}

impl BusPins for SimPins {
    fn connect(&mut self, pins: PinPair, pullup: Pullup) {
        self.state.borrow_mut().connected = Some((pins, pullup));
    }

    fn release(&mut self, pins: PinPair, _pullup: Pullup) {
        let mut state = self.state.borrow_mut();
        state.released.push(pins);
        if state.connected.is_some_and(|(connected, _)| connected == pins) {
            state.connected = None;
        }
    }

    fn drive_scl(&mut self, _pins: PinPair, high: bool) {
        let mut state = self.state.borrow_mut();
        if !high {
            state.scl_pulses += 1;
            state.sda_stuck_clocks = state.sda_stuck_clocks.saturating_sub(1);
        }
    }

    fn sda_is_high(&self, _pins: PinPair) -> bool {
        self.state.borrow().sda_stuck_clocks == 0
    }

    fn arm_sda_rising(&mut self, _pins: PinPair) {
        let mut state = self.state.borrow_mut();
        state.sda_armed = true;
        state.sda_arms += 1;
    }

    fn disarm_sda_rising(&mut self, _pins: PinPair) {
        self.state.borrow_mut().sda_armed = false;
    }
}

/// Clock that ticks 1 us per reading, plus NVIC and DMA stand-ins.
pub(crate) struct MockPlatform {
    state: Rc<RefCell<SimState>>,
}

impl MicrosClock for MockPlatform {
    fn now(&self) -> MicrosInstant {
        let mut state = self.state.borrow_mut();
        state.now_us = state.now_us.wrapping_add(1);
        MicrosInstant::from_ticks(state.now_us)
    }
}

impl DelayNs for MockPlatform {
    fn delay_ns(&mut self, ns: u32) {
        let mut state = self.state.borrow_mut();
        let total = u64::from(state.spare_ns) + u64::from(ns);
        state.now_us = state.now_us.wrapping_add((total / 1_000) as u32);
        state.spare_ns = (total % 1_000) as u32;
    }
}

impl InterruptPriority for MockPlatform {
    fn execution_priority(&self) -> u16 {
        self.state.borrow().exec_priority
    }

    fn irq_priority(&self, irq: u16) -> u8 {
        self.state
            .borrow()
            .irq_priorities
            .get(&irq)
            .copied()
            .unwrap_or(DEFAULT_IRQ_PRIORITY)
    }

    fn set_irq_priority(&mut self, irq: u16, priority: u8) {
        let mut state = self.state.borrow_mut();
        state.irq_priorities.insert(irq, priority);
        state.priority_writes.push((irq, priority));
    }

    fn enable_irq(&mut self, irq: u16) {
        self.state.borrow_mut().enabled_irqs.push(irq);
    }
}

impl DmaAllocator for MockPlatform {
    type Channel = SimDmaChannel;

    fn allocate(&mut self, _bus: BusId) -> Option<Self::Channel> {
        let mut state = self.state.borrow_mut();
        if !state.dma_available || state.dma.allocated {
            return None;
        }
        state.dma.allocated = true;
        Some(SimDmaChannel {
            state: Rc::clone(&self.state),
        })
    }

    fn release(&mut self, _channel: Self::Channel) {
        let mut state = self.state.borrow_mut();
        state.dma.allocated = false;
        state.dma_releases += 1;
    }
}

pub(crate) struct SimDmaChannel {
    state: Rc<RefCell<SimState>>,
}

impl DmaChannel for SimDmaChannel {
    unsafe fn configure_transmit(&mut self, source: *const u8, len: usize, _data_register: usize) {
        let mut state = self.state.borrow_mut();
        let dma = &mut state.dma;
        dma.source = Some(source);
        dma.destination = None;
        dma.remaining = len;
        dma.requests = 0;
        dma.complete = false;
        dma.error = false;
    }

    unsafe fn configure_receive(&mut self, _data_register: usize, destination: *mut u8, len: usize) {
        let mut state = self.state.borrow_mut();
        let dma = &mut state.dma;
        dma.source = None;
        dma.destination = Some(destination);
        dma.remaining = len;
        dma.requests = 0;
        dma.complete = false;
        dma.error = false;
    }

    fn enable(&mut self) {
        self.state.borrow_mut().dma.enabled = true;
    }

    fn disable(&mut self) {
        self.state.borrow_mut().dma.enabled = false;
    }

    fn is_complete(&self) -> bool {
        self.state.borrow().dma.complete
    }

    fn clear_complete(&mut self) {
        self.state.borrow_mut().dma.complete = false;
    }

    fn clear_interrupt(&mut self) {
        self.state.borrow_mut().dma.interrupt = false;
    }

    fn has_error(&self) -> bool {
        self.state.borrow().dma.error
    }

    fn clear_error(&mut self) {
        self.state.borrow_mut().dma.error = false;
    }

    fn remaining(&self) -> usize {
        self.state.borrow().dma.remaining
    }
}

/// What a slave target saw, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TargetEvent {
    Init(u8),
    Start { repeated: bool },
    AddressMatch(u8),
    Read,
    Write(Vec<u8>),
    Stop,
}

/// Slave target that records callbacks and answers reads from `response`.
#[derive(Default)]
pub(crate) struct SimTarget {
    pub(crate) events: Vec<TargetEvent>,
    pub(crate) response: Vec<u8>,
    pub(crate) reject: bool,
}

impl embedded_hal::i2c::ErrorType for SimTarget {
    type Error = crate::i2c::common::Error;
}

impl I2CCoreTarget for SimTarget {
    fn init(&mut self, address: u8) -> Result<(), Self::Error> {
        self.events.push(TargetEvent::Init(address));
        Ok(())
    }
    fn on_transaction_start(&mut self, repeated: bool) {
        self.events.push(TargetEvent::Start { repeated });
    }
    fn on_stop(&mut self) {
        self.events.push(TargetEvent::Stop);
    }
    fn on_address_match(&mut self, address: u8) -> bool {
        self.events.push(TargetEvent::AddressMatch(address));
        !self.reject
    }
}

impl ReadTarget for SimTarget {
    fn on_read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        self.events.push(TargetEvent::Read);
        let len = self.response.len().min(buffer.len());
        buffer[..len].copy_from_slice(&self.response[..len]);
        Ok(len)
    }
}

impl WriteTarget for SimTarget {
    fn on_write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.events.push(TargetEvent::Write(data.to_vec()));
        Ok(())
    }
}

impl WriteReadTarget for SimTarget {}

impl RegisterAccess for SimTarget {
    fn write_register(&mut self, _register: u8, _data: u8) -> Result<(), Self::Error> {
        Ok(())
    }
    fn read_register(&mut self, _register: u8, _data: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}
