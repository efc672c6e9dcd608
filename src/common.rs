// Licensed under the Apache-2.0 license

//! Logging hooks shared by the driver modules.
//!
//! Drivers take a `Logger` as a generic parameter so that builds without a
//! console pay nothing for it. Messages are formatted into a fixed-size
//! stack buffer; anything that does not fit is dropped.

use core::fmt::{Arguments, Write};

/// Longest formatted log line, in bytes.
pub const LOG_LINE_LEN: usize = 96;

pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Formats `args` into a bounded line.
#[must_use]
pub fn format_line(args: Arguments<'_>) -> heapless::String<LOG_LINE_LEN> {
    let mut line = heapless::String::new();
    // A line that does not fit is truncated at the failing fragment.
    let _ = line.write_fmt(args);
    line
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::common::Logger::debug(
            &mut $logger,
            &$crate::common::format_line(format_args!($($arg)*)),
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::common::Logger::error(
            &mut $logger,
            &$crate::common::format_line(format_args!($($arg)*)),
        )
    };
}
