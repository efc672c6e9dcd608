// Licensed under the Apache-2.0 license

//! Register interface of the Kinetis I2C peripheral.
//!
//! The state machine reaches the hardware only through [`I2cRegisters`], which
//! hands out typed copies of the 8-bit registers. [`KinetisRegisters`] is the
//! memory-mapped implementation; tests substitute a simulated peripheral.

use crate::i2c::common::BusId;
use tock_registers::fields::FieldValue;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};

register_bitfields![u8,
    pub C1 [
        IICEN OFFSET(7) NUMBITS(1) [],
        IICIE OFFSET(6) NUMBITS(1) [],
        MST OFFSET(5) NUMBITS(1) [],
        TX OFFSET(4) NUMBITS(1) [],
        TXAK OFFSET(3) NUMBITS(1) [],
        RSTA OFFSET(2) NUMBITS(1) [],
        WUEN OFFSET(1) NUMBITS(1) [],
        DMAEN OFFSET(0) NUMBITS(1) []
    ],
    pub S [
        TCF OFFSET(7) NUMBITS(1) [],
        IAAS OFFSET(6) NUMBITS(1) [],
        BUSY OFFSET(5) NUMBITS(1) [],
        ARBL OFFSET(4) NUMBITS(1) [],
        RAM OFFSET(3) NUMBITS(1) [],
        SRW OFFSET(2) NUMBITS(1) [],
        IICIF OFFSET(1) NUMBITS(1) [],
        RXAK OFFSET(0) NUMBITS(1) []
    ],
    pub C2 [
        GCAEN OFFSET(7) NUMBITS(1) [],
        ADEXT OFFSET(6) NUMBITS(1) [],
        HDRS OFFSET(5) NUMBITS(1) [],
        SBRC OFFSET(4) NUMBITS(1) [],
        RMEN OFFSET(3) NUMBITS(1) [],
        AD OFFSET(0) NUMBITS(3) []
    ],
    pub FLT [
        SHEN OFFSET(7) NUMBITS(1) [],
        STOPF OFFSET(6) NUMBITS(1) [],
        STOPIE OFFSET(5) NUMBITS(1) [],
        FLT OFFSET(0) NUMBITS(5) []
    ]
];

register_structs! {
    pub I2cRegisterBlock {
        (0x00 => a1: ReadWrite<u8>),
        (0x01 => f: ReadWrite<u8>),
        (0x02 => c1: ReadWrite<u8, C1::Register>),
        (0x03 => s: ReadWrite<u8, S::Register>),
        (0x04 => d: ReadWrite<u8>),
        (0x05 => c2: ReadWrite<u8, C2::Register>),
        (0x06 => flt: ReadWrite<u8, FLT::Register>),
        (0x07 => ra: ReadWrite<u8>),
        (0x08 => smb: ReadWrite<u8>),
        (0x09 => a2: ReadWrite<u8>),
        (0x0A => slth: ReadWrite<u8>),
        (0x0B => sltl: ReadWrite<u8>),
        (0x0C => @END),
    }
}

pub type C1Value = LocalRegisterCopy<u8, C1::Register>;
pub type StatusValue = LocalRegisterCopy<u8, S::Register>;
pub type FltValue = LocalRegisterCopy<u8, FLT::Register>;

/// Base addresses of the I2C register blocks, shared by the K20 and KL26 parts.
pub const I2C0_BASE: usize = 0x4006_6000;
pub const I2C1_BASE: usize = 0x4006_7000;

#[must_use]
pub const fn base_address(bus: BusId) -> usize {
    match bus {
        BusId::I2c0 => I2C0_BASE,
        BusId::I2c1 => I2C1_BASE,
    }
}

/// Volatile access to one bus instance's registers.
///
/// Every method is a single register access. Reads of D and writes to D and
/// C1 have bus side effects, so callers must not issue them speculatively.
pub trait I2cRegisters {
    fn control1(&self) -> C1Value;
    /// Overwrites C1 with exactly the given fields.
    fn write_control1(&self, value: FieldValue<u8, C1::Register>);
    fn modify_control1(&self, value: FieldValue<u8, C1::Register>);

    fn status(&self) -> StatusValue;
    /// Clears write-one-to-clear status flags.
    fn clear_status(&self, flags: FieldValue<u8, S::Register>);

    fn read_data(&self) -> u8;
    fn write_data(&self, byte: u8);

    fn write_control2(&self, value: FieldValue<u8, C2::Register>);

    fn filter(&self) -> FltValue;
    fn modify_filter(&self, value: FieldValue<u8, FLT::Register>);
    /// Clears STOPF, preserving the other filter fields.
    fn clear_stop_flag(&self);

    fn write_address(&self, a1: u8);
    fn write_range_address(&self, ra: u8);
    fn write_divider(&self, f: u8);

    /// Address of D, used as the DMA source or destination.
    fn data_register_address(&self) -> usize;
}

/// Memory-mapped register block.
pub struct KinetisRegisters {
    regs: &'static I2cRegisterBlock,
}

impl KinetisRegisters {
    /// # Safety
    ///
    /// `base` must point at an I2C register block that nothing else accesses
    /// for the lifetime of the returned value.
    #[must_use]
    pub unsafe fn new(base: usize) -> Self {
        Self {
            regs: &*(base as *const I2cRegisterBlock),
        }
    }

    /// # Safety
    ///
    /// Same contract as [`KinetisRegisters::new`] for the instance's block.
    #[must_use]
    pub unsafe fn for_bus(bus: BusId) -> Self {
        Self::new(base_address(bus))
    }
}

impl I2cRegisters for KinetisRegisters {
    fn control1(&self) -> C1Value {
        self.regs.c1.extract()
    }

    fn write_control1(&self, value: FieldValue<u8, C1::Register>) {
        self.regs.c1.write(value);
    }

    fn modify_control1(&self, value: FieldValue<u8, C1::Register>) {
        self.regs.c1.modify(value);
    }

    fn status(&self) -> StatusValue {
        self.regs.s.extract()
    }

    fn clear_status(&self, flags: FieldValue<u8, S::Register>) {
        self.regs.s.write(flags);
    }

    fn read_data(&self) -> u8 {
        self.regs.d.get()
    }

    fn write_data(&self, byte: u8) {
        self.regs.d.set(byte);
    }

    fn write_control2(&self, value: FieldValue<u8, C2::Register>) {
        self.regs.c2.write(value);
    }

    fn filter(&self) -> FltValue {
        self.regs.flt.extract()
    }

    fn modify_filter(&self, value: FieldValue<u8, FLT::Register>) {
        self.regs.flt.modify(value);
    }

    fn clear_stop_flag(&self) {
        // STOPF is write-one-to-clear.
        self.regs.flt.modify(FLT::STOPF::SET);
    }

    fn write_address(&self, a1: u8) {
        self.regs.a1.set(a1);
    }

    fn write_range_address(&self, ra: u8) {
        self.regs.ra.set(ra);
    }

    fn write_divider(&self, f: u8) {
        self.regs.f.set(f);
    }

    fn data_register_address(&self) -> usize {
        core::ptr::addr_of!(self.regs.d) as usize
    }
}
