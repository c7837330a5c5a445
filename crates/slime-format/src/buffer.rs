use byteorder::{BigEndian, ByteOrder};
use std::io;

/// Slime byte buffer. Contains the buffer and the cursor.
/// The cursor is used to keep track of the current read position in the buffer;
/// writes always append to the end.
/// All multi-byte values are big-endian.
#[derive(Debug, Default)]
pub struct SlimeBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

fn eof(needed: usize, remaining: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!(
            "Not enough bytes: needed {}, {} remaining",
            needed, remaining
        ),
    )
}

impl SlimeBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buffer: bytes,
            cursor: 0,
        }
    }

    pub fn get_cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn get_buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Borrows the next `len` bytes and advances the cursor past them.
    pub fn read_bytes(&mut self, len: usize) -> io::Result<&[u8]> {
        if len > self.remaining() {
            return Err(eof(len, self.remaining()));
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.buffer[start..self.cursor])
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Any nonzero byte reads as `true`.
    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        Ok(BigEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        Ok(BigEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        Ok(BigEndian::read_i64(self.read_bytes(8)?))
    }

    /// Reads an `i32` length prefix. Negative lengths are invalid data, and a length
    /// of `element_size`-wide items that cannot fit in the rest of the buffer is EOF.
    pub fn read_length(&mut self, element_size: usize) -> io::Result<usize> {
        let length = self.read_i32()?;
        if length < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Negative length: {}", length),
            ));
        }
        let length = length as usize;
        let needed = length.saturating_mul(element_size);
        if needed > self.remaining() {
            return Err(eof(needed, self.remaining()));
        }
        Ok(length)
    }

    pub fn read_long_array(&mut self, count: usize) -> io::Result<Vec<i64>> {
        let bytes = self.read_bytes(count.saturating_mul(8))?;
        Ok(bytes.chunks_exact(8).map(BigEndian::read_i64).collect())
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut bytes = [0u8; 2];
        BigEndian::write_i16(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0u8; 4];
        BigEndian::write_i32(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_i64(&mut self, value: i64) {
        let mut bytes = [0u8; 8];
        BigEndian::write_i64(&mut bytes, value);
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn write_bytes_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes an `i32` length prefix followed by the bytes.
    pub fn write_sized_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let length = i32::try_from(bytes.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Payload too large: {} bytes", bytes.len()),
            )
        })?;
        self.write_i32(length);
        self.write_bytes_raw(bytes);
        Ok(())
    }
}
