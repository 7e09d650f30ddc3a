//! Deflate codec (`ZIPS_COMPRESSION`, `ZIP_COMPRESSION`).
//!
//! Both methods share one bit stream format; they differ only in how many
//! scanlines go into a block, which the block geometry decides.

use super::optimize::*;
use super::Codec;
use crate::enums::Compression;
use crate::error::{Error, Result};

/// Zlib stream of the reordered, delta-predicted block.
#[derive(Debug, Clone, Copy)]
pub struct ZipCodec {
    /// Deflate level, 0 to 10.
    pub level: u8,
}

impl Default for ZipCodec {
    fn default() -> Self {
        Self { level: 4 }
    }
}

impl ZipCodec {
    pub fn new(level: u8) -> Self {
        Self { level: level.min(10) }
    }
}

impl Codec for ZipCodec {
    fn compress(&self, raw: &[u8], _compression: Compression) -> Result<Vec<u8>> {
        let mut data = raw.to_vec();
        separate_bytes_fragments(&mut data);
        samples_to_differences(&mut data);
        Ok(miniz_oxide::deflate::compress_to_vec_zlib(&data, self.level))
    }

    fn decompress(
        &self,
        packed: &[u8],
        _compression: Compression,
        expected_raw_size: usize,
    ) -> Result<Vec<u8>> {
        let options = zune_inflate::DeflateOptions::default()
            .set_limit(expected_raw_size)
            .set_size_hint(expected_raw_size);
        let mut decoder = zune_inflate::DeflateDecoder::new_with_options(packed, options);
        let mut data = decoder
            .decode_zlib()
            .map_err(|_| Error::format("zlib-compressed block is malformed"))?;

        differences_to_samples(&mut data);
        interleave_byte_blocks(&mut data);
        Ok(data)
    }
}
