// Licensed under the Apache-2.0 license

//! Kinetis I2C driver.
//!
//! Master and slave operation of the I2C peripherals found on the K20 and
//! KL26 parts (Teensy 3.0, 3.1/3.2 and LC), for bare-metal `no_std` use.
//! Master transfers run polled, interrupt driven or with DMA bulk moves;
//! slave transfers are interrupt driven and delivered to a
//! `proposed_traits` I2C target.

pub mod acquire;
pub mod buffer;
pub mod common;
pub mod dma;
pub mod hardware_instantiation;
pub mod i2c_controller;
pub mod kinetis_i2c;
pub mod master;
pub mod nvic;
pub mod rate;
pub mod recovery;
pub mod registers;
#[cfg(test)]
pub(crate) mod sim;
pub mod slave;
pub mod system_setup;
pub mod traits;
