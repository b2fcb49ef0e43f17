use crate::error::Error;

/// Bounds-checked forward reader over a byte slice.
///
/// All multi-byte reads are big-endian. Every operation that would cross
/// the end of the slice fails with [`Error::OutOfRange`] and leaves the
/// position unchanged; nothing here panics.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    /// Current offset from the start of the slice
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Consume `n` bytes and return them as a slice
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(n).ok_or(Error::OutOfRange)?;
        let s = self.data.get(self.pos..end).ok_or(Error::OutOfRange)?;
        self.pos = end;
        Ok(s)
    }

    /// Advance the position without looking at the bytes
    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.take(n).map(|_| ())
    }

    /// Move the position to an absolute offset
    pub fn seek(&mut self, pos: usize) -> Result<(), Error> {
        if pos > self.data.len() {
            return Err(Error::OutOfRange);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let b = *self.data.get(self.pos).ok_or(Error::OutOfRange)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        let s = self.take(2)?;
        Ok(u16::from_be_bytes([s[0], s[1]]))
    }

    /// Read a 3-byte big-endian integer (TLS handshake length fields)
    pub fn read_u24(&mut self) -> Result<u32, Error> {
        let s = self.take(3)?;
        Ok((u32::from(s[0]) << 16) | (u32::from(s[1]) << 8) | u32::from(s[2]))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        let s = self.take(4)?;
        Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
    }
}
