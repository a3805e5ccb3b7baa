//! Bounded cursors over byte slices.
use crate::codec::{Decode, Encode, Error};

/// Tracks the write position in a caller-provided buffer.
///
/// A write that doesn't fit fails with [`Error::InsufficientSpace`] and leaves the buffer as it was.
pub struct WriteCursor<'d> {
    pos: usize,
    data: &'d mut [u8],
}

impl<'d> WriteCursor<'d> {
    pub fn new(data: &'d mut [u8]) -> Self {
        Self { pos: 0, data }
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.reserve(bytes.len())?;
        self.data[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn write<E: Encode>(&mut self, value: E) -> Result<(), Error> {
        let end = self.reserve(value.size())?;
        value.encode(&mut self.data[self.pos..end])?;
        self.pos = end;
        Ok(())
    }

    /// Bytes left.
    pub fn available(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    /// The written part of the buffer.
    pub fn finish(self) -> &'d mut [u8] {
        &mut self.data[..self.pos]
    }

    fn reserve(&self, n: usize) -> Result<usize, Error> {
        if self.available() < n {
            return Err(Error::InsufficientSpace);
        }
        Ok(self.pos + n)
    }
}

#[derive(Debug, Clone)]
pub struct ReadCursor<'d> {
    pos: usize,
    data: &'d [u8],
}

impl<'d> ReadCursor<'d> {
    pub fn new(data: &'d [u8]) -> Self {
        Self { pos: 0, data }
    }

    pub fn read<T: Decode<'d>>(&mut self) -> Result<T, Error> {
        let value = T::decode(&self.data[self.pos..])?;
        self.pos += value.size();
        Ok(value)
    }

    /// Borrow the next `n` bytes.
    pub fn slice(&mut self, n: usize) -> Result<&'d [u8], Error> {
        if self.available() < n {
            return Err(Error::InsufficientSpace);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn available(&self) -> usize {
        self.data.len() - self.pos
    }
}
