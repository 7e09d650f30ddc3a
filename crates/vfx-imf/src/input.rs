//! On-demand pixel reader.
//!
//! Opening a file parses the header(s) and offset tables and checks that
//! every offset points into the file. Pixels are read per request: only the
//! chunks overlapping the requested rows are loaded, decompressed (in
//! parallel with the `rayon` feature) and converted to the requested type.
//!
//! ```no_run
//! use vfx_imf::{InputFile, PixelType, convert};
//!
//! let mut file = InputFile::open("in.exr")?;
//! let window = file.header().data_window()?;
//! let red = file.channel_as("R", PixelType::Float)?;
//! let red = convert::bytes_to_floats(&red);
//! assert_eq!(red.len() as i64, window.width() * window.height());
//! # Ok::<(), vfx_imf::Error>(())
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::RangeInclusive;
use std::path::Path;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::attribute::AttributeStore;
use crate::block::{BlockCoord, Geometry};
use crate::compression::Codecs;
use crate::convert::le_to_ne;
use crate::enums::{Compression, PixelType};
use crate::error::{Error, Result};
use crate::format::{FormatVersion, MAGIC};
use crate::header::Header;
use crate::io::{read_bytes, read_i32, read_u32, read_u64};
use crate::options::ReadOptions;

/// Header, geometry and offset table of one part.
#[derive(Debug, Clone)]
struct PartReader {
    header: Header,
    geometry: Geometry,
    offsets: Vec<u64>,
}

/// A chunk read from the file, before decompression.
struct PackedBlock {
    group: usize,
    tx: usize,
    bytes: Vec<u8>,
}

/// Reader of single- and multi-part files.
///
/// A single-part file opens as a container with one part.
pub struct MultiPartInputFile<R: Read + Seek = BufReader<File>> {
    read: R,
    version: FormatVersion,
    parts: Vec<PartReader>,
    options: ReadOptions,
}

impl MultiPartInputFile {
    /// Opens `path` and parses its headers.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ReadOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening input file");
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), options)
    }
}

impl<R: Read + Seek> MultiPartInputFile<R> {
    /// Parses headers and offset tables from any seekable source.
    pub fn from_reader(mut read: R, options: ReadOptions) -> Result<Self> {
        let file_len = read.seek(SeekFrom::End(0))?;
        read.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        read.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::format(format!("bad magic number {magic:02x?}")));
        }
        let version = FormatVersion::from_word(read_u32(&mut read)?)?;
        if version.deep {
            return Err(Error::unsupported("deep data"));
        }

        let limit = version.name_limit();
        let mut headers = Vec::new();
        if version.multipart {
            loop {
                let store = AttributeStore::read_from(&mut read, limit, options.max_attribute_size)?;
                if store.is_empty() {
                    break;
                }
                headers.push(Header::from_attributes(store));
            }
            if headers.is_empty() {
                return Err(Error::format("multi-part file without parts"));
            }
        } else {
            let store = AttributeStore::read_from(&mut read, limit, options.max_attribute_size)?;
            headers.push(Header::from_attributes(store));
        }

        let mut parts = Vec::with_capacity(headers.len());
        for (index, header) in headers.into_iter().enumerate() {
            header.validate().map_err(Error::into_format)?;
            if !version.multipart && version.single_tiled != header.is_tiled() {
                return Err(Error::format("tiled flag does not match the header"));
            }
            if version.multipart && header.name().is_none() {
                return Err(Error::format(format!("part {index} has no name")));
            }
            let geometry = Geometry::from_header(&header).map_err(Error::into_format)?;
            let count = geometry.chunk_count();
            if let Some(declared) = header.chunk_count() {
                if declared as i64 != count as i64 {
                    return Err(Error::format(format!(
                        "part {index} declares {declared} chunks, its layout has {count}"
                    )));
                }
            }
            parts.push(PartReader {
                header,
                geometry,
                offsets: Vec::with_capacity(count),
            });
        }

        for (index, part) in parts.iter_mut().enumerate() {
            for entry in 0..part.geometry.chunk_count() {
                let offset = read_u64(&mut read)?;
                if offset == 0 || offset >= file_len {
                    return Err(Error::format(format!(
                        "part {index} offset {entry} is {offset}: file is truncated or was not closed"
                    )));
                }
                part.offsets.push(offset);
            }
        }

        debug!(
            parts = parts.len(),
            multipart = version.multipart,
            bytes = file_len,
            "parsed input"
        );

        Ok(Self {
            read,
            version,
            parts,
            options,
        })
    }

    /// Number of parts.
    pub fn parts(&self) -> usize {
        self.parts.len()
    }

    /// Version flags of the file.
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    fn part(&self, part: usize) -> Result<&PartReader> {
        self.parts
            .get(part)
            .ok_or_else(|| Error::not_found("part", part.to_string()))
    }

    /// Parsed header of `part`.
    pub fn header(&self, part: usize) -> Result<&Header> {
        Ok(&self.part(part)?.header)
    }

    /// All rows of channel `name` of `part` in its stored type.
    pub fn channel(&mut self, part: usize, name: &str) -> Result<Vec<u8>> {
        self.read_channel(part, name, None, None)
    }

    /// All rows of channel `name` of `part` converted to `pixel_type`.
    pub fn channel_as(&mut self, part: usize, name: &str, pixel_type: PixelType) -> Result<Vec<u8>> {
        self.read_channel(part, name, Some(pixel_type), None)
    }

    /// Rows `rows` (default: the whole data window) of one channel.
    ///
    /// Without a `pixel_type` the stored type is kept.
    pub fn read_channel(
        &mut self,
        part: usize,
        name: &str,
        pixel_type: Option<PixelType>,
        rows: Option<RangeInclusive<i32>>,
    ) -> Result<Vec<u8>> {
        let mut buffers = self.read_rows(part, &[name], pixel_type, rows)?;
        Ok(buffers.pop().unwrap_or_default())
    }

    /// Several channels of `part`, each block decoded once.
    pub fn channels<S: AsRef<str>>(&mut self, part: usize, names: &[S]) -> Result<Vec<Vec<u8>>> {
        self.read_rows(part, names, None, None)
    }

    /// Several channels of `part` converted to `pixel_type`.
    pub fn channels_as<S: AsRef<str>>(
        &mut self,
        part: usize,
        names: &[S],
        pixel_type: PixelType,
    ) -> Result<Vec<Vec<u8>>> {
        self.read_rows(part, names, Some(pixel_type), None)
    }

    /// Rows of several channels, in the order of `names`.
    pub fn read_rows<S: AsRef<str>>(
        &mut self,
        part: usize,
        names: &[S],
        pixel_type: Option<PixelType>,
        rows: Option<RangeInclusive<i32>>,
    ) -> Result<Vec<Vec<u8>>> {
        let reader = self
            .parts
            .get(part)
            .ok_or_else(|| Error::not_found("part", part.to_string()))?;
        let geometry = &reader.geometry;
        let window = geometry.data_window;

        let mut slots = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let slot = geometry
                .channel_index(name)
                .ok_or_else(|| Error::not_found("channel", name))?;
            slots.push(slot);
        }

        let (lo, hi) = match rows {
            Some(range) => (*range.start(), *range.end()),
            None => (window.min.y, window.max.y),
        };
        if lo > hi || !window.contains_row(lo) || !window.contains_row(hi) {
            return Err(Error::contract(format!(
                "rows {lo}..={hi} are not inside the data window {window}"
            )));
        }

        let groups = geometry.groups_for_rows(lo, hi);
        let mut packed = Vec::with_capacity(groups.clone().count() * geometry.tiles_x());
        for group in groups.clone() {
            for tx in 0..geometry.tiles_x() {
                let index = geometry.chunk_index(group, tx);
                let bytes = read_chunk(
                    &mut self.read,
                    self.version.multipart.then_some(part),
                    geometry,
                    index,
                    reader.offsets[index],
                )?;
                packed.push(PackedBlock { group, tx, bytes });
            }
        }

        let parallel = self.options.decode_in_parallel() && packed.len() > 1;
        let raws = decode_blocks(&self.options.codecs, geometry, packed, parallel)?;

        let mut outputs: Vec<Vec<u8>> = slots
            .iter()
            .map(|&slot| {
                let channel = geometry.channels()[slot];
                let target = pixel_type.unwrap_or(channel.pixel_type);
                Vec::with_capacity(channel.stored_rows(lo, hi) * channel.samples_per_row(&window) * target.size())
            })
            .collect();

        let mut raws = raws.into_iter();
        for index in groups {
            let mut group = geometry.new_group(index);
            for tx in 0..geometry.tiles_x() {
                if let Some(raw) = raws.next() {
                    geometry.scatter(&mut group, tx, &raw)?;
                }
            }

            for y in lo.max(group.lo)..=hi.min(group.hi) {
                for (output, &slot) in outputs.iter_mut().zip(&slots) {
                    let channel = geometry.channels()[slot];
                    if channel.stores_row(y) {
                        let target = pixel_type.unwrap_or(channel.pixel_type);
                        le_to_ne(group.row(geometry, slot, y), channel.pixel_type, target, output);
                    }
                }
            }
        }

        trace!(part, lo, hi, channels = names.len(), "read rows");
        Ok(outputs)
    }
}

/// Reads chunk `index` at `offset` and checks its header.
fn read_chunk<R: Read + Seek>(
    read: &mut R,
    part_number: Option<usize>,
    geometry: &Geometry,
    index: usize,
    offset: u64,
) -> Result<Vec<u8>> {
    read.seek(SeekFrom::Start(offset))?;

    if let Some(part) = part_number {
        let found = read_i32(read)?;
        if found as i64 != part as i64 {
            return Err(Error::format(format!(
                "chunk at offset {offset} belongs to part {found}, expected {part}"
            )));
        }
    }

    let coord = if geometry.is_tiled() {
        let x = read_i32(read)?;
        let y = read_i32(read)?;
        let level_x = read_i32(read)?;
        let level_y = read_i32(read)?;
        if level_x != 0 || level_y != 0 {
            return Err(Error::format(format!("tile level ({level_x}, {level_y}) in a single-level part")));
        }
        BlockCoord::Tile { x, y }
    } else {
        BlockCoord::Line(read_i32(read)?)
    };

    let found = geometry.index_of(coord)?;
    if found != index {
        return Err(Error::format(format!(
            "chunk at offset {offset} holds block {found}, expected {index}"
        )));
    }

    let size = read_u32(read)? as usize;
    trace!(index, size, "read chunk");
    read_bytes(read, size)
}

fn decode_block(codecs: &Codecs, geometry: &Geometry, compression: Compression, block: PackedBlock) -> Result<Vec<u8>> {
    let expected = geometry.raw_block_size(block.group, block.tx);
    codecs.unpack(block.bytes, compression, expected)
}

/// Decompresses blocks, keeping their order.
fn decode_blocks(
    codecs: &Codecs,
    geometry: &Geometry,
    blocks: Vec<PackedBlock>,
    parallel: bool,
) -> Result<Vec<Vec<u8>>> {
    let compression = geometry.compression;

    #[cfg(feature = "rayon")]
    if parallel {
        return blocks
            .into_par_iter()
            .map(|block| decode_block(codecs, geometry, compression, block))
            .collect();
    }

    #[cfg(not(feature = "rayon"))]
    let _ = parallel;

    blocks
        .into_iter()
        .map(|block| decode_block(codecs, geometry, compression, block))
        .collect()
}

/// Reader of the first part of a file.
pub struct InputFile<R: Read + Seek = BufReader<File>> {
    file: MultiPartInputFile<R>,
}

impl InputFile {
    /// Opens `path`. For a multi-part file, part 0 is read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: MultiPartInputFile::open(path)?,
        })
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        Ok(Self {
            file: MultiPartInputFile::open_with_options(path, options)?,
        })
    }
}

impl<R: Read + Seek> InputFile<R> {
    pub fn from_reader(read: R, options: ReadOptions) -> Result<Self> {
        Ok(Self {
            file: MultiPartInputFile::from_reader(read, options)?,
        })
    }

    /// Parsed header.
    pub fn header(&self) -> &Header {
        &self.file.parts[0].header
    }

    /// Version flags of the file.
    pub fn version(&self) -> FormatVersion {
        self.file.version()
    }

    /// All rows of channel `name` in its stored type.
    pub fn channel(&mut self, name: &str) -> Result<Vec<u8>> {
        self.file.channel(0, name)
    }

    /// All rows of channel `name` converted to `pixel_type`.
    pub fn channel_as(&mut self, name: &str, pixel_type: PixelType) -> Result<Vec<u8>> {
        self.file.channel_as(0, name, pixel_type)
    }

    pub fn read_channel(
        &mut self,
        name: &str,
        pixel_type: Option<PixelType>,
        rows: Option<RangeInclusive<i32>>,
    ) -> Result<Vec<u8>> {
        self.file.read_channel(0, name, pixel_type, rows)
    }

    pub fn channels<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<Vec<u8>>> {
        self.file.channels(0, names)
    }

    pub fn channels_as<S: AsRef<str>>(&mut self, names: &[S], pixel_type: PixelType) -> Result<Vec<Vec<u8>>> {
        self.file.channels_as(0, names, pixel_type)
    }

    /// The wrapped multi-part reader.
    pub fn into_multipart(self) -> MultiPartInputFile<R> {
        self.file
    }
}
