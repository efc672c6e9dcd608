// Licensed under the Apache-2.0 license

//! Transmit and receive buffers owned by a bus context.

use crate::i2c::common::Error;

/// Buffer capacity: 256 data bytes plus the address byte and two command bytes.
pub const BUFFER_LEN: usize = 259;

/// Outgoing bytes. In master mode byte 0 is the address byte.
#[derive(Debug)]
pub struct TxBuffer {
    pub(crate) data: [u8; BUFFER_LEN],
    pub(crate) len: usize,
    pub(crate) index: usize,
    pub(crate) write_error: bool,
}

impl Default for TxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TxBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; BUFFER_LEN],
            len: 0,
            index: 0,
            write_error: false,
        }
    }

    /// Appends one byte. Returns 0 and flags a write error when full.
    pub fn write(&mut self, byte: u8) -> usize {
        match self.data.get_mut(self.len) {
            Some(slot) => {
                *slot = byte;
                self.len += 1;
                1
            }
            None => {
                self.write_error = true;
                0
            }
        }
    }

    /// Appends as much of `bytes` as fits, flagging a write error on truncation.
    pub fn write_slice(&mut self, bytes: &[u8]) -> usize {
        let space = BUFFER_LEN - self.len;
        let count = bytes.len().min(space);
        if count < bytes.len() {
            self.write_error = true;
        }
        let (Some(dst), Some(src)) = (
            self.data.get_mut(self.len..self.len + count),
            bytes.get(..count),
        ) else {
            return 0;
        };
        dst.copy_from_slice(src);
        self.len += count;
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn write_error(&self) -> bool {
        self.write_error
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.data.get(..self.len).unwrap_or(&[])
    }

    pub(crate) fn byte(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0)
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
        self.index = 0;
        self.write_error = false;
    }

    /// Starts a master transmit to `address`.
    pub(crate) fn begin(&mut self, address: u8) {
        self.clear();
        if let Some(first) = self.data.first_mut() {
            *first = address << 1;
            self.len = 1;
        }
    }
}

/// Incoming bytes and the consumer's read cursor.
#[derive(Debug)]
pub struct RxBuffer {
    pub(crate) data: [u8; BUFFER_LEN],
    pub(crate) len: usize,
    pub(crate) index: usize,
}

impl Default for RxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RxBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0; BUFFER_LEN],
            len: 0,
            index: 0,
        }
    }

    /// Bytes received but not yet read.
    #[must_use]
    pub fn available(&self) -> usize {
        self.len - self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.index += 1;
        Some(byte)
    }

    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        if self.index < self.len {
            self.data.get(self.index).copied()
        } else {
            None
        }
    }

    /// Like [`RxBuffer::read`] but yields 0 when empty.
    pub fn read_byte(&mut self) -> u8 {
        self.read().unwrap_or(0)
    }

    #[must_use]
    pub fn peek_byte(&self) -> u8 {
        self.peek().unwrap_or(0)
    }

    /// Everything received by the last transfer, regardless of the read cursor.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        self.data.get(..self.len).unwrap_or(&[])
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
        self.index = 0;
    }

    /// Appends a byte, silently dropping it when full.
    pub(crate) fn push(&mut self, byte: u8) {
        if let Some(slot) = self.data.get_mut(self.len) {
            *slot = byte;
            self.len += 1;
        }
    }
}

impl embedded_io::ErrorType for TxBuffer {
    type Error = Error;
}

impl embedded_io::Write for TxBuffer {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.write_slice(buf) {
            0 => Err(Error::BufferOverflow),
            count => Ok(count),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::ErrorType for RxBuffer {
    type Error = Error;
}

impl embedded_io::Read for RxBuffer {
    /// Drains received bytes; returns 0 once the buffer is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        for slot in buf.iter_mut() {
            match RxBuffer::read(self) {
                Some(byte) => *slot = byte,
                None => break,
            }
            count += 1;
        }
        Ok(count)
    }
}
