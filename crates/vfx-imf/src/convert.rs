//! Sample conversion between the three channel types.
//!
//! Buffers handed to and from callers are native-endian; file data is
//! little-endian. Conversions follow plain numeric casts:
//!
//! | from \ to | UINT                  | HALF           | FLOAT        |
//! |-----------|-----------------------|----------------|--------------|
//! | UINT      | -                     | nearest, inf above 65504 | nearest |
//! | HALF      | truncate, saturate    | -              | exact        |
//! | FLOAT     | truncate, saturate    | nearest        | -            |
//!
//! Float to integer conversion saturates at `0` and `u32::MAX`; NaN becomes 0.

use half::f16;

use crate::enums::PixelType;
use crate::error::{Error, Result};

#[inline]
fn read_le(bytes: &[u8], at: usize, pixel_type: PixelType) -> Sample {
    match pixel_type {
        PixelType::Uint => Sample::Uint(u32::from_le_bytes(word(bytes, at))),
        PixelType::Float => Sample::Float(f32::from_le_bytes(word(bytes, at))),
        PixelType::Half => Sample::Half(f16::from_le_bytes([bytes[at], bytes[at + 1]])),
    }
}

#[inline]
fn word(bytes: &[u8], at: usize) -> [u8; 4] {
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

#[derive(Debug, Clone, Copy)]
enum Sample {
    Uint(u32),
    Half(f16),
    Float(f32),
}

impl Sample {
    #[inline]
    fn to_u32(self) -> u32 {
        match self {
            Self::Uint(v) => v,
            Self::Half(v) => v.to_f32() as u32,
            Self::Float(v) => v as u32,
        }
    }

    #[inline]
    fn to_f16(self) -> f16 {
        match self {
            Self::Uint(v) => f16::from_f32(v as f32),
            Self::Half(v) => v,
            Self::Float(v) => f16::from_f32(v),
        }
    }

    #[inline]
    fn to_f32(self) -> f32 {
        match self {
            Self::Uint(v) => v as f32,
            Self::Half(v) => v.to_f32(),
            Self::Float(v) => v,
        }
    }

    #[inline]
    fn push_ne(self, pixel_type: PixelType, out: &mut Vec<u8>) {
        match pixel_type {
            PixelType::Uint => out.extend_from_slice(&self.to_u32().to_ne_bytes()),
            PixelType::Half => out.extend_from_slice(&self.to_f16().to_ne_bytes()),
            PixelType::Float => out.extend_from_slice(&self.to_f32().to_ne_bytes()),
        }
    }
}

/// Appends little-endian `from` samples to `out` as native-endian `to` samples.
pub fn le_to_ne(src: &[u8], from: PixelType, to: PixelType, out: &mut Vec<u8>) {
    if from == to && cfg!(target_endian = "little") {
        out.extend_from_slice(src);
        return;
    }

    let size = from.size();
    out.reserve(src.len() / size * to.size());
    for at in (0..src.len() - src.len() % size).step_by(size) {
        read_le(src, at, from).push_ne(to, out);
    }
}

/// Copies native-endian samples into a little-endian destination of the same length.
pub fn ne_to_le(src: &[u8], pixel_type: PixelType, dst: &mut [u8]) {
    debug_assert_eq!(src.len(), dst.len());
    if cfg!(target_endian = "little") {
        dst.copy_from_slice(src);
        return;
    }

    let size = pixel_type.size();
    for (s, d) in src.chunks_exact(size).zip(dst.chunks_exact_mut(size)) {
        for (i, byte) in s.iter().rev().enumerate() {
            d[i] = *byte;
        }
    }
}

/// Converts a native-endian buffer of `from` samples to `to` samples.
pub fn convert(src: &[u8], from: PixelType, to: PixelType) -> Result<Vec<u8>> {
    let size = from.size();
    if src.len() % size != 0 {
        return Err(Error::contract(format!(
            "buffer of {} bytes is not a whole number of {from} samples",
            src.len()
        )));
    }

    let mut le = src.to_vec();
    if cfg!(target_endian = "big") {
        for sample in le.chunks_exact_mut(size) {
            sample.reverse();
        }
    }

    let mut out = Vec::with_capacity(src.len() / size * to.size());
    le_to_ne(&le, from, to, &mut out);
    Ok(out)
}

// === Typed views ===

/// Native-endian bytes of `u32` samples.
pub fn uints_to_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Native-endian bytes of `f16` samples.
pub fn halves_to_bytes(values: &[f16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Native-endian bytes of `f32` samples.
pub fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// `u32` samples from native-endian bytes; a trailing partial sample is ignored.
pub fn bytes_to_uints(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// `f16` samples from native-endian bytes; a trailing partial sample is ignored.
pub fn bytes_to_halves(bytes: &[u8]) -> Vec<f16> {
    bytes
        .chunks_exact(2)
        .map(|c| f16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

/// `f32` samples from native-endian bytes; a trailing partial sample is ignored.
pub fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
