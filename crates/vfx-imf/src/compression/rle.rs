//! Run-length codec (`RLE_COMPRESSION`).

use super::optimize::*;
use super::Codec;
use crate::enums::Compression;
use crate::error::{Error, Result};

const MIN_RUN_LENGTH: usize = 3;
const MAX_RUN_LENGTH: usize = 127;

/// Byte-oriented run-length encoding after reorder and delta prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct RleCodec;

impl Codec for RleCodec {
    fn compress(&self, raw: &[u8], _compression: Compression) -> Result<Vec<u8>> {
        let mut data = raw.to_vec();
        separate_bytes_fragments(&mut data);
        samples_to_differences(&mut data);
        Ok(encode(&data))
    }

    fn decompress(
        &self,
        packed: &[u8],
        _compression: Compression,
        expected_raw_size: usize,
    ) -> Result<Vec<u8>> {
        let mut data = decode(packed, expected_raw_size)?;
        differences_to_samples(&mut data);
        interleave_byte_blocks(&mut data);
        Ok(data)
    }
}

/// Encodes runs as `(count - 1, value)` and literals as `(-count, bytes...)`.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(data.len());
    let mut run_start = 0;
    let mut run_end = 1;

    while run_start < data.len() {
        while run_end < data.len()
            && data[run_start] == data[run_end]
            && run_end - run_start - 1 < MAX_RUN_LENGTH
        {
            run_end += 1;
        }

        if run_end - run_start >= MIN_RUN_LENGTH {
            packed.push((run_end - run_start - 1) as u8);
            packed.push(data[run_start]);
            run_start = run_end;
        } else {
            while run_end < data.len()
                && ((run_end + 1 >= data.len() || data[run_end] != data[run_end + 1])
                    || (run_end + 2 >= data.len() || data[run_end + 1] != data[run_end + 2]))
                && run_end - run_start < MAX_RUN_LENGTH
            {
                run_end += 1;
            }

            packed.push((run_start as i32 - run_end as i32) as u8);
            packed.extend_from_slice(&data[run_start..run_end]);
            run_start = run_end;
        }

        run_end += 1;
    }

    packed
}

/// Decodes until `expected_size` bytes are produced; trailing input is an error.
pub fn decode(packed: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut remaining = packed;
    let mut data = Vec::with_capacity(expected_size);

    while !remaining.is_empty() && data.len() < expected_size {
        let count = take_1(&mut remaining)? as i8 as i32;

        if count < 0 {
            let literal = take_n(&mut remaining, (-count) as usize)?;
            data.extend_from_slice(literal);
        } else {
            let value = take_1(&mut remaining)?;
            data.resize(data.len() + count as usize + 1, value);
        }
    }

    if !remaining.is_empty() || data.len() != expected_size {
        return Err(Error::format("run-length data does not match the block size"));
    }

    Ok(data)
}

fn take_1(slice: &mut &[u8]) -> Result<u8> {
    let (&first, rest) = slice
        .split_first()
        .ok_or_else(|| Error::format("run-length data ends early"))?;
    *slice = rest;
    Ok(first)
}

fn take_n<'s>(slice: &mut &'s [u8], n: usize) -> Result<&'s [u8]> {
    if n > slice.len() {
        return Err(Error::format("run-length literal ends early"));
    }
    let (front, back) = slice.split_at(n);
    *slice = back;
    Ok(front)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_and_literals() {
        let data = [1, 1, 1, 1, 1, 2, 3, 4, 5, 5, 5, 5, 5, 5, 5, 5];
        let packed = encode(&data);
        assert_eq!(packed[..2], [4, 1]);
        assert_eq!(decode(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_long_run_splits() {
        let data = vec![7u8; 300];
        let packed = encode(&data);
        assert!(packed.len() < 10);
        assert_eq!(decode(&packed, 300).unwrap(), data);
    }

    #[test]
    fn test_edge_sizes() {
        for data in [vec![], vec![42], vec![1, 2], (0..=255).collect::<Vec<u8>>()] {
            assert_eq!(decode(&encode(&data), data.len()).unwrap(), data);
        }
    }

    #[test]
    fn test_size_mismatch() {
        let packed = encode(&[9; 20]);
        assert!(decode(&packed, 19).is_err());
        assert!(decode(&packed, 21).is_err());
        assert!(decode(&[0x80], 4).is_err());
    }

    #[test]
    fn test_codec_roundtrip() {
        let raw: Vec<u8> = (0..1000u32).flat_map(|i| (i / 3).to_le_bytes()).collect();
        let packed = RleCodec.compress(&raw, Compression::Rle).unwrap();
        assert!(packed.len() < raw.len());
        assert_eq!(RleCodec.decompress(&packed, Compression::Rle, raw.len()).unwrap(), raw);
    }
}
