//! Random-access little-endian byte stream.
//!
//! [`ByteStream`] is a cursor over a borrowed byte slice.  Seeking anywhere
//! (even past the end) is allowed; reads beyond the end fail with
//! `io::ErrorKind::UnexpectedEof`, which surfaces as [`TagfileError::Io`].
//!
//! Sub-streams created with [`ByteStream::sub_stream`] are independent
//! cursors over a bounded window: position 0 of the sub-stream is the byte
//! the parent was positioned at.

use std::io::{self, Cursor, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Result, TagfileError};

#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(data) }
    }

    // ── Position ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn pos(&self) -> u64 {
        self.cursor.position()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Bytes left between the cursor and the end (0 when past the end).
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.pos())
    }

    #[inline]
    pub fn eos(&self) -> bool {
        self.pos() >= self.len()
    }

    pub fn seek(&mut self, offset: u64) {
        self.cursor.set_position(offset);
    }

    pub fn skip(&mut self, count: i64) -> Result<()> {
        self.cursor.seek(SeekFrom::Current(count))?;
        Ok(())
    }

    /// Advance to the next multiple of `alignment` measured from `origin`.
    pub fn align_from(&mut self, origin: u64, alignment: u64) {
        let rel = self.pos().saturating_sub(origin) % alignment;
        if rel != 0 {
            self.seek(self.pos() + (alignment - rel));
        }
    }

    // ── Scalars ──────────────────────────────────────────────────────────────

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.cursor.read_u16::<LittleEndian>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.cursor.read_i16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.cursor.read_u64::<LittleEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.cursor.read_f32::<LittleEndian>()?)
    }

    /// Read an unsigned little-endian integer of `width` bytes (at most 8).
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        Ok(self.cursor.read_uint::<LittleEndian>(width)?)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let start = self.pos() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        let end = start.checked_add(count).filter(|&end| end <= data.len()).ok_or_else(eof)?;
        self.cursor.set_position(end as u64);
        Ok(&data[start..end])
    }

    // ── Strings ──────────────────────────────────────────────────────────────

    /// Read a `size`-byte string field, dropping everything from the first
    /// NUL onward.
    pub fn read_fixed_string(&mut self, size: usize) -> Result<String> {
        let raw = self.read_bytes(size)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Read bytes up to (and consuming) the next NUL.
    pub fn read_cstring(&mut self) -> Result<String> {
        let mut raw = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                b => raw.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    // ── Sub-streams ──────────────────────────────────────────────────────────

    /// Split off the next `len` bytes as an independent stream and advance
    /// past them.
    pub fn sub_stream(&mut self, len: usize) -> Result<ByteStream<'a>> {
        Ok(ByteStream::new(self.read_bytes(len)?))
    }
}

fn eof() -> TagfileError {
    TagfileError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of stream"))
}
