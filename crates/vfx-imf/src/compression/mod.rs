//! Per-chunk compression.
//!
//! The pixel engine never compresses anything itself: every chunk goes
//! through a [`Codec`] looked up in a [`Codecs`] registry by the part's
//! [`Compression`]. The registry returned by [`Codecs::builtin`] handles
//! `NONE`, `RLE`, `ZIPS` and `ZIP`; other methods can be plugged in with
//! [`Codecs::register`].
//!
//! Codecs see raw blocks (little-endian samples, see [`crate::block`]) and
//! must restore them byte for byte.

mod optimize;
pub mod rle;
pub mod zip;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::enums::Compression;
use crate::error::{Error, Result};

pub use rle::RleCodec;
pub use zip::ZipCodec;

/// Compressor and decompressor for one or more compression methods.
pub trait Codec: Send + Sync {
    /// Packs a raw block.
    fn compress(&self, raw: &[u8], compression: Compression) -> Result<Vec<u8>>;

    /// Restores a raw block of `expected_raw_size` bytes.
    fn decompress(
        &self,
        packed: &[u8],
        compression: Compression,
        expected_raw_size: usize,
    ) -> Result<Vec<u8>>;
}

/// Stores blocks unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCodec;

impl Codec for NoCodec {
    fn compress(&self, raw: &[u8], _compression: Compression) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(
        &self,
        packed: &[u8],
        _compression: Compression,
        _expected_raw_size: usize,
    ) -> Result<Vec<u8>> {
        Ok(packed.to_vec())
    }
}

/// Maps compression methods to codecs.
#[derive(Clone)]
pub struct Codecs {
    codecs: HashMap<Compression, Arc<dyn Codec>>,
}

impl Codecs {
    /// Registry without any codec.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry with the built-in lossless codecs.
    pub fn builtin() -> Self {
        Self::empty()
            .with(Compression::None, NoCodec)
            .with(Compression::Rle, RleCodec)
            .with(Compression::Zips, ZipCodec::default())
            .with(Compression::Zip, ZipCodec::default())
    }

    /// Registers `codec` for `compression`, replacing any previous one.
    pub fn register(&mut self, compression: Compression, codec: impl Codec + 'static) {
        self.codecs.insert(compression, Arc::new(codec));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, compression: Compression, codec: impl Codec + 'static) -> Self {
        self.register(compression, codec);
        self
    }

    /// Returns `true` if a codec is registered for `compression`.
    pub fn supports(&self, compression: Compression) -> bool {
        self.codecs.contains_key(&compression)
    }

    /// Codec for `compression`.
    pub fn get(&self, compression: Compression) -> Result<&dyn Codec> {
        self.codecs
            .get(&compression)
            .map(|codec| codec.as_ref())
            .ok_or_else(|| Error::unsupported(format!("no codec registered for {compression}")))
    }

    /// Compresses a raw block, keeping it raw when packing does not shrink it.
    pub fn pack(&self, raw: Vec<u8>, compression: Compression) -> Result<Vec<u8>> {
        if compression == Compression::None {
            return Ok(raw);
        }
        let packed = self.get(compression)?.compress(&raw, compression)?;
        Ok(if packed.len() < raw.len() { packed } else { raw })
    }

    /// Restores a raw block read from a chunk.
    ///
    /// A chunk that is as large as its raw block was stored uncompressed.
    pub fn unpack(
        &self,
        packed: Vec<u8>,
        compression: Compression,
        expected_raw_size: usize,
    ) -> Result<Vec<u8>> {
        if packed.len() == expected_raw_size {
            return Ok(packed);
        }
        if compression == Compression::None || packed.len() > expected_raw_size {
            return Err(Error::format(format!(
                "chunk of {} bytes for a block of {expected_raw_size} bytes",
                packed.len()
            )));
        }

        let raw = self
            .get(compression)?
            .decompress(&packed, compression, expected_raw_size)?;
        if raw.len() != expected_raw_size {
            return Err(Error::format(format!(
                "{compression} block decompressed to {} bytes, expected {expected_raw_size}",
                raw.len()
            )));
        }
        Ok(raw)
    }
}

impl Default for Codecs {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.codecs.keys().copied().collect();
        keys.sort();
        f.debug_set().entries(keys.iter().map(|c| c.name())).finish()
    }
}
