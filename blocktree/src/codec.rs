//! # Wire Codec
//!
//! Hand-rolled big-endian encoding for the block formats. No serde here:
//! the byte layout is a compatibility contract, and deriving it from struct
//! definitions would let a refactor silently change stored data.
//!
//! Two building blocks cover every format in the crate:
//!
//! - Fixed-width unsigned integers (8/16/32/64 bit), written big-endian.
//!   The writer takes `u64` and range-checks, so a length that outgrows its
//!   field fails loudly with `ArgumentOutOfBounds` instead of truncating.
//! - Length-prefixed variable fields with a 2-byte header, for anything
//!   whose size is not fixed (payloads, public keys, signatures).
//!
//! Hash fields come in two encodings, both ending in this module:
//!
//! - The chain layer's `prev` slot is length-prefixed (`len - 1` in one
//!   byte), with a single zero byte standing in for "no previous block".
//! - Tree and secure layers use a fixed 32-byte field where all zeros means
//!   "none".
//!
//! Readers and writers are tagged with the [`Layer`] they serve so codec
//! errors surface with the right layer attribution.

use crate::config::{HASH_LENGTH, MAX_VAR_FIELD};
use crate::error::{BlocktreeError, Layer, Result, SerializationReason};
use crate::hash::BlockHash;

// ---------------------------------------------------------------------------
// ByteWriter
// ---------------------------------------------------------------------------

/// Append-only encoder for one serialized record.
#[derive(Debug)]
pub struct ByteWriter {
    layer: Layer,
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Start an empty buffer attributed to `layer`.
    pub fn new(layer: Layer) -> Self {
        ByteWriter {
            layer,
            buf: Vec::new(),
        }
    }

    /// Start with a capacity hint for callers that know their layout.
    pub fn with_capacity(layer: Layer, capacity: usize) -> Self {
        ByteWriter {
            layer,
            buf: Vec::with_capacity(capacity),
        }
    }

    fn out_of_bounds(&self) -> BlocktreeError {
        BlocktreeError::serialization(self.layer, SerializationReason::ArgumentOutOfBounds)
    }

    /// Write one byte; fails when `value > u8::MAX`.
    pub fn put_u8(&mut self, value: u64) -> Result<()> {
        let v = u8::try_from(value).map_err(|_| self.out_of_bounds())?;
        self.buf.push(v);
        Ok(())
    }

    /// Write a 2-byte big-endian integer; fails when `value > u16::MAX`.
    pub fn put_u16(&mut self, value: u64) -> Result<()> {
        let v = u16::try_from(value).map_err(|_| self.out_of_bounds())?;
        self.buf.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// Write a 4-byte big-endian integer; fails when `value > u32::MAX`.
    pub fn put_u32(&mut self, value: u64) -> Result<()> {
        let v = u32::try_from(value).map_err(|_| self.out_of_bounds())?;
        self.buf.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// Write an 8-byte big-endian integer. Cannot fail.
    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write raw bytes with no framing.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a 2-byte length prefix followed by the bytes.
    pub fn put_var(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_VAR_FIELD {
            return Err(self.out_of_bounds());
        }
        self.put_u16(bytes.len() as u64)?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a fixed-width hash field; `None` becomes all zeros.
    pub fn put_hash_opt(&mut self, hash: Option<&BlockHash>) {
        match hash {
            Some(h) => self.buf.extend_from_slice(h.as_bytes()),
            None => self.buf.extend_from_slice(&[0u8; HASH_LENGTH]),
        }
    }

    /// Write the chain layer's length-prefixed `prev` slot.
    ///
    /// `Some(h)` encodes as `[HASH_LENGTH - 1][hash bytes]`; `None` encodes
    /// as `[0][0x00]`, a single zero byte in a length-1 slot.
    pub fn put_prev(&mut self, prev: Option<&BlockHash>) {
        match prev {
            Some(h) => {
                self.buf.push((HASH_LENGTH - 1) as u8);
                self.buf.extend_from_slice(h.as_bytes());
            }
            None => {
                self.buf.push(0);
                self.buf.push(0);
            }
        }
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// Cursor-style decoder over one serialized record.
///
/// Every `take_*` advances the cursor; reading past the end fails with
/// `ArgumentOutOfBounds` rather than panicking, since the input is
/// frequently untrusted bytes off disk.
#[derive(Debug)]
pub struct ByteReader<'a> {
    layer: Layer,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a buffer attributed to `layer`.
    pub fn new(layer: Layer, buf: &'a [u8]) -> Self {
        ByteReader { layer, buf, pos: 0 }
    }

    fn out_of_bounds(&self) -> BlocktreeError {
        BlocktreeError::serialization(self.layer, SerializationReason::ArgumentOutOfBounds)
    }

    /// Take `n` raw bytes.
    pub fn take_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.out_of_bounds())?;
        if end > self.buf.len() {
            return Err(self.out_of_bounds());
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Take one byte.
    pub fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take_bytes(1)?[0])
    }

    /// Take a 2-byte big-endian integer.
    pub fn take_u16(&mut self) -> Result<u16> {
        let bytes = self.take_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Take a 4-byte big-endian integer.
    pub fn take_u32(&mut self) -> Result<u32> {
        let bytes = self.take_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Take an 8-byte big-endian integer.
    pub fn take_u64(&mut self) -> Result<u64> {
        let bytes = self.take_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(arr))
    }

    /// Take a 2-byte-length-prefixed variable field.
    pub fn take_var(&mut self) -> Result<&'a [u8]> {
        let len = self.take_u16()? as usize;
        self.take_bytes(len)
    }

    /// Take a fixed-width hash field, normalizing all zeros to `None`.
    pub fn take_hash_opt(&mut self) -> Result<Option<BlockHash>> {
        let bytes = self.take_bytes(HASH_LENGTH)?;
        let hash = BlockHash::from_slice(bytes)?;
        Ok(hash.into_option())
    }

    /// Take the chain layer's length-prefixed `prev` slot.
    ///
    /// Accepts exactly two shapes: a length-1 zero byte (no previous block)
    /// or a full-width hash. Anything else is a malformed record.
    pub fn take_prev(&mut self) -> Result<Option<BlockHash>> {
        let len = self.take_u8()? as usize + 1;
        match len {
            1 => {
                let b = self.take_u8()?;
                if b != 0 {
                    return Err(BlocktreeError::serialization(
                        self.layer,
                        SerializationReason::InvalidHash,
                    ));
                }
                Ok(None)
            }
            HASH_LENGTH => {
                let bytes = self.take_bytes(HASH_LENGTH)?;
                Ok(Some(BlockHash::from_slice(bytes)?))
            }
            _ => Err(BlocktreeError::serialization(
                self.layer,
                SerializationReason::InvalidHash,
            )),
        }
    }

    /// Consume and return everything left in the buffer.
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    /// True when the cursor has reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}
