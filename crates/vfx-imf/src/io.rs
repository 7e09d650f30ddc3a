//! Low-level binary helpers shared by the header and chunk codecs.
//!
//! All multi-byte values in the file are little-endian.

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::format::LONG_NAME_LIMIT;

/// Reads a NUL-terminated name of at most `limit` bytes.
///
/// An immediate NUL yields an empty string, which callers use as the end of
/// a list.
pub fn read_name<R: Read>(read: &mut R, limit: usize) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let byte = read.read_u8()?;
        if byte == 0 {
            break;
        }
        if bytes.len() == limit {
            return Err(Error::format(format!("name longer than {limit} bytes")));
        }
        bytes.push(byte);
    }
    String::from_utf8(bytes).map_err(|_| Error::format("name is not valid UTF-8"))
}

/// Writes `name` followed by a NUL.
pub fn write_name<W: Write>(write: &mut W, name: &str) -> Result<()> {
    write.write_all(name.as_bytes())?;
    write.write_u8(0)?;
    Ok(())
}

/// Checks a name before it is written: non-empty, NUL-free, at most 255 bytes.
pub fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::contract(format!("{kind} name is empty")));
    }
    if name.len() > LONG_NAME_LIMIT {
        return Err(Error::contract(format!(
            "{kind} name `{name}` is longer than {LONG_NAME_LIMIT} bytes"
        )));
    }
    if name.bytes().any(|b| b == 0) {
        return Err(Error::contract(format!("{kind} name contains NUL")));
    }
    Ok(())
}

pub fn read_i32<R: Read>(read: &mut R) -> Result<i32> {
    Ok(read.read_i32::<LittleEndian>()?)
}

pub fn read_u32<R: Read>(read: &mut R) -> Result<u32> {
    Ok(read.read_u32::<LittleEndian>()?)
}

pub fn read_u64<R: Read>(read: &mut R) -> Result<u64> {
    Ok(read.read_u64::<LittleEndian>()?)
}

pub fn read_f32<R: Read>(read: &mut R) -> Result<f32> {
    Ok(read.read_f32::<LittleEndian>()?)
}

pub fn read_f64<R: Read>(read: &mut R) -> Result<f64> {
    Ok(read.read_f64::<LittleEndian>()?)
}

pub fn write_i32<W: Write>(write: &mut W, value: i32) -> Result<()> {
    Ok(write.write_i32::<LittleEndian>(value)?)
}

pub fn write_u32<W: Write>(write: &mut W, value: u32) -> Result<()> {
    Ok(write.write_u32::<LittleEndian>(value)?)
}

pub fn write_u64<W: Write>(write: &mut W, value: u64) -> Result<()> {
    Ok(write.write_u64::<LittleEndian>(value)?)
}

pub fn write_f32<W: Write>(write: &mut W, value: f32) -> Result<()> {
    Ok(write.write_f32::<LittleEndian>(value)?)
}

pub fn write_f64<W: Write>(write: &mut W, value: f64) -> Result<()> {
    Ok(write.write_f64::<LittleEndian>(value)?)
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
///
/// A corrupt size field must not make us allocate gigabytes up front, so the
/// buffer grows with the data actually present.
pub fn read_bytes<R: Read>(read: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(len.min(1 << 16));
    let got = (&mut *read).take(len as u64).read_to_end(&mut bytes)?;
    if got != len {
        return Err(Error::format(format!(
            "expected {len} bytes, found only {got}"
        )));
    }
    Ok(bytes)
}

/// Writer that counts the bytes passed through it.
///
/// Chunk offsets are recorded from this count, so the inner writer must be
/// positioned at the start of the file when wrapped.
#[derive(Debug)]
pub struct Tracking<W> {
    inner: W,
    position: u64,
}

impl<W: Write + Seek> Tracking<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far, equal to the current file offset.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Overwrites bytes at `offset` and returns to the end of the stream.
    pub fn patch(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(bytes)?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    pub fn inner_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Tracking<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
