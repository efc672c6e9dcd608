// Licensed under the Apache-2.0 license

//! SCL rate translation.
//!
//! Rates are quantized steps measured on a 48 MHz bus clock rather than
//! theoretical SCL frequencies, which correlate poorly with the divider
//! settings. For each supported bus clock a table maps the step to the
//! frequency divider (F) value; every table shares one glitch filter (FLT)
//! setting. Unsupported steps fall off the fast end of the table, so the
//! fastest available entry is used instead.

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum I2cRate {
    Rate100,
    Rate200,
    Rate300,
    Rate400,
    Rate600,
    Rate800,
    Rate1000,
    Rate1200,
    Rate1500,
    Rate1800,
    Rate2000,
    Rate2400,
    Rate2800,
    Rate3000,
}

impl I2cRate {
    /// Nominal SCL frequency in Hz.
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            I2cRate::Rate100 => 100_000,
            I2cRate::Rate200 => 200_000,
            I2cRate::Rate300 => 300_000,
            I2cRate::Rate400 => 400_000,
            I2cRate::Rate600 => 600_000,
            I2cRate::Rate800 => 800_000,
            I2cRate::Rate1000 => 1_000_000,
            I2cRate::Rate1200 => 1_200_000,
            I2cRate::Rate1500 => 1_500_000,
            I2cRate::Rate1800 => 1_800_000,
            I2cRate::Rate2000 => 2_000_000,
            I2cRate::Rate2400 => 2_400_000,
            I2cRate::Rate2800 => 2_800_000,
            I2cRate::Rate3000 => 3_000_000,
        }
    }

    /// Quantizes a raw frequency to the nearest measured step.
    #[must_use]
    pub const fn from_frequency(hz: u32) -> Self {
        match hz {
            2_050_000.. => I2cRate::Rate3000,
            1_950_000.. => I2cRate::Rate2800,
            1_800_000.. => I2cRate::Rate2400,
            1_520_000.. => I2cRate::Rate2000,
            1_330_000.. => I2cRate::Rate1800,
            1_100_000.. => I2cRate::Rate1500,
            950_000.. => I2cRate::Rate1200,
            800_000.. => I2cRate::Rate1000,
            650_000.. => I2cRate::Rate800,
            475_000.. => I2cRate::Rate600,
            350_000.. => I2cRate::Rate400,
            250_000.. => I2cRate::Rate300,
            150_000.. => I2cRate::Rate200,
            _ => I2cRate::Rate100,
        }
    }
}

/// Register values for a rate at a given bus clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DividerSetting {
    /// Frequency divider register value.
    pub f: u8,
    /// Glitch filter length.
    pub flt: u8,
    /// Rate actually programmed.
    pub rate: I2cRate,
    /// False when the requested rate was replaced by a fallback.
    pub exact: bool,
}

struct BusTable {
    bus_hz: u32,
    flt: u8,
    /// Ordered slowest to fastest.
    dividers: &'static [(I2cRate, u8)],
}

use I2cRate::*;

static TABLES: [BusTable; 9] = [
    BusTable {
        bus_hz: 60_000_000,
        flt: 4,
        dividers: &[
            (Rate100, 0x2C),
            (Rate200, 0x24),
            (Rate300, 0x55),
            (Rate400, 0x4F),
            (Rate600, 0x19),
            (Rate800, 0x13),
            (Rate1000, 0x45),
            (Rate1200, 0x0D),
            (Rate1500, 0x0B),
            (Rate1800, 0x06),
            (Rate2000, 0x05),
            (Rate2400, 0x02),
            (Rate2800, 0x01),
            (Rate3000, 0x00),
        ],
    },
    BusTable {
        bus_hz: 56_000_000,
        flt: 4,
        dividers: &[
            (Rate100, 0x2C),
            (Rate200, 0x24),
            (Rate300, 0x1E),
            (Rate400, 0x4F),
            (Rate600, 0x15),
            (Rate800, 0x0F),
            (Rate1000, 0x0E),
            (Rate1200, 0x0C),
            (Rate1500, 0x0A),
            (Rate1800, 0x09),
            (Rate2000, 0x04),
            (Rate2400, 0x02),
            (Rate2800, 0x00),
        ],
    },
    BusTable {
        bus_hz: 48_000_000,
        flt: 4,
        dividers: &[
            (Rate100, 0x27),
            (Rate200, 0x5A),
            (Rate300, 0x1C),
            (Rate400, 0x85),
            (Rate600, 0x14),
            (Rate800, 0x45),
            (Rate1000, 0x0D),
            (Rate1200, 0x0B),
            (Rate1500, 0x09),
            (Rate1800, 0x03),
            (Rate2000, 0x02),
            (Rate2400, 0x00),
        ],
    },
    BusTable {
        bus_hz: 36_000_000,
        flt: 3,
        dividers: &[
            (Rate100, 0x95),
            (Rate200, 0x55),
            (Rate300, 0x85),
            (Rate400, 0x15),
            (Rate600, 0x45),
            (Rate800, 0x0C),
            (Rate1000, 0x0A),
            (Rate1200, 0x05),
            (Rate1500, 0x02),
            (Rate1800, 0x00),
        ],
    },
    BusTable {
        bus_hz: 24_000_000,
        flt: 2,
        dividers: &[
            (Rate100, 0x1F),
            (Rate200, 0x85),
            (Rate300, 0x14),
            (Rate400, 0x45),
            (Rate600, 0x0B),
            (Rate800, 0x05),
            (Rate1000, 0x02),
            (Rate1200, 0x00),
        ],
    },
    BusTable {
        bus_hz: 16_000_000,
        flt: 1,
        dividers: &[
            (Rate100, 0x1D),
            (Rate200, 0x14),
            (Rate300, 0x43),
            (Rate400, 0x0B),
            (Rate600, 0x03),
            (Rate800, 0x00),
        ],
    },
    BusTable {
        bus_hz: 8_000_000,
        flt: 1,
        dividers: &[
            (Rate100, 0x14),
            (Rate200, 0x0B),
            (Rate300, 0x03),
            (Rate400, 0x00),
        ],
    },
    BusTable {
        bus_hz: 4_000_000,
        flt: 0,
        dividers: &[(Rate100, 0x0B), (Rate200, 0x00)],
    },
    BusTable {
        bus_hz: 2_000_000,
        flt: 0,
        dividers: &[(Rate100, 0x00)],
    },
];

/// Looks up the divider and filter for `rate` at `bus_hz`.
///
/// Unknown bus clocks yield F=0 and FLT=0 with `exact == false`.
#[must_use]
pub fn divider(bus_hz: u32, rate: I2cRate) -> DividerSetting {
    let Some(table) = TABLES.iter().find(|table| table.bus_hz == bus_hz) else {
        return DividerSetting {
            f: 0,
            flt: 0,
            rate,
            exact: false,
        };
    };

    if let Some(&(rate, f)) = table.dividers.iter().find(|(r, _)| *r == rate) {
        return DividerSetting {
            f,
            flt: table.flt,
            rate,
            exact: true,
        };
    }

    let (fastest, f) = table.dividers.last().copied().unwrap_or((Rate100, 0));
    DividerSetting {
        f,
        flt: table.flt,
        rate: fastest,
        exact: false,
    }
}
