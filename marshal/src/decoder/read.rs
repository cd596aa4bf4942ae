//! Helpers for reading the [crate::wire] format out of a byte slice.

use crate::errors::{DecodeError, RecordError};
use crate::wire::varint::{self, VarintError};

/// A position inside the input. Every read either succeeds and
/// advances, or fails and leaves the position unchanged.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn truncated(&self, needed: usize) -> DecodeError {
        DecodeError::TruncatedInput {
            offset: self.buf.len(),
            needed,
        }
    }

    /// Consume exactly `len` bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(self.truncated(len - self.remaining()));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    /// Consume a little-endian [u16].
    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Consume a little-endian [u64].
    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Consume a LEB128 varint.
    pub fn varint(&mut self) -> Result<u64, DecodeError> {
        varint::decode(self.buf, &mut self.pos).map_err(|e| match e {
            VarintError::Truncated => self.truncated(1),
            VarintError::Overflow => DecodeError::InvalidRecord {
                offset: self.pos,
                reason: RecordError::VarintOverflow,
            },
        })
    }

    /// Consume a length-prefixed byte string of at most `max_len` bytes.
    pub fn string(&mut self, max_len: u64) -> Result<&'a [u8], DecodeError> {
        let offset = self.pos;
        let len = self.varint()?;
        if len > max_len {
            self.pos = offset;
            return Err(DecodeError::LimitExceeded {
                what: "byte string length",
                limit: max_len,
                found: len,
                offset,
            });
        }

        if len > self.remaining() as u64 {
            let needed = (len - self.remaining() as u64) as usize;
            self.pos = offset;
            return Err(self.truncated(needed));
        }
        // len <= remaining, so it fits into a usize
        self.bytes(len as usize)
    }
}
