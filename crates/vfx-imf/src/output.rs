//! Incremental pixel writer.
//!
//! # Writing Pipeline
//!
//! ```text
//! Header(s)
//!     │
//!     ├── validate, derive block geometry
//!     ├── magic + version word + attribute streams
//!     ├── zero-filled offset table per part
//!     │
//!     ├── write_pixels(frame, rows)        (any number of calls)
//!     │    ├── copy rows into the pending row group
//!     │    └── full group → split → compress → chunk
//!     │
//!     └── close: patch offset tables, flush
//! ```
//!
//! Chunk boundaries depend only on the block geometry, so splitting the
//! rows into calls differently yields byte-identical files.
//!
//! # Example
//!
//! ```no_run
//! use vfx_imf::{FrameBuffer, Header, OutputFile, convert};
//!
//! let header = Header::new(4, 2);
//! let plane = convert::floats_to_bytes(&[0.5; 8]);
//! let mut file = OutputFile::create("out.exr", &header)?;
//! let frame = FrameBuffer::new()
//!     .with("R", &plane)
//!     .with("G", &plane)
//!     .with("B", &plane);
//! file.write_pixels(&frame, 2)?;
//! file.close()?;
//! # Ok::<(), vfx_imf::Error>(())
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::block::{BlockCoord, Geometry, RowGroup};
use crate::channel::sampled_count;
use crate::compression::Codecs;
use crate::convert::ne_to_le;
use crate::enums::Compression;
use crate::error::{Error, Result};
use crate::format::{FormatVersion, MAGIC};
use crate::header::{Header, names};
use crate::io::{Tracking, write_i32, write_u32};
use crate::options::WriteOptions;

/// Caller-owned pixel rows, one native-endian buffer per channel.
///
/// Every buffer covers the rows of one `write_pixels` call, top to bottom,
/// and holds only the stored samples of sub-sampled channels.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer<'a> {
    slices: BTreeMap<String, &'a [u8]>,
}

impl<'a> FrameBuffer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the buffer of channel `name`.
    pub fn insert(&mut self, name: impl Into<String>, data: &'a [u8]) {
        self.slices.insert(name.into(), data);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, data: &'a [u8]) -> Self {
        self.insert(name, data);
        self
    }

    pub fn get(&self, name: &str) -> Option<&'a [u8]> {
        self.slices.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(String::as_str)
    }
}

// === Engine ===

/// Write state of one part.
#[derive(Debug)]
struct PartWriter {
    geometry: Geometry,
    /// Next row in line order.
    next_row: i64,
    rows_written: usize,
    total_rows: usize,
    pending: Option<RowGroup>,
    offsets: Vec<u64>,
    table_position: u64,
}

impl PartWriter {
    fn new(geometry: Geometry) -> Self {
        let window = geometry.data_window;
        let next_row = if geometry.line_order.is_decreasing() {
            window.max.y as i64
        } else {
            window.min.y as i64
        };
        Self {
            next_row,
            rows_written: 0,
            total_rows: window.height() as usize,
            pending: None,
            offsets: vec![0; geometry.chunk_count()],
            table_position: 0,
            geometry,
        }
    }

    fn is_complete(&self) -> bool {
        self.rows_written == self.total_rows
    }

    /// First and last row covered by a call of `row_count` rows.
    fn call_rows(&self, row_count: usize) -> Result<(i32, i32)> {
        if row_count == 0 {
            return Err(Error::contract("row count must be positive"));
        }
        let remaining = self.total_rows - self.rows_written;
        if row_count > remaining {
            return Err(Error::contract(format!(
                "writing {row_count} rows past the data window, {remaining} remain"
            )));
        }

        let n = row_count as i64;
        Ok(if self.geometry.line_order.is_decreasing() {
            ((self.next_row - n + 1) as i32, self.next_row as i32)
        } else {
            (self.next_row as i32, (self.next_row + n - 1) as i32)
        })
    }

    /// Checks the frame buffer against the layout and returns one buffer per slot.
    fn sources<'a>(&self, frame: &FrameBuffer<'a>, lo: i32, hi: i32) -> Result<Vec<&'a [u8]>> {
        let geometry = &self.geometry;
        let mut sources = Vec::with_capacity(geometry.channels().len());
        for (slot, (name, channel)) in geometry
            .channel_names()
            .iter()
            .zip(geometry.channels())
            .enumerate()
        {
            let data = frame
                .get(name)
                .ok_or_else(|| Error::contract(format!("frame buffer has no channel `{name}`")))?;
            let expected = channel.stored_rows(lo, hi) * geometry.row_bytes(slot);
            if data.len() != expected {
                return Err(Error::contract(format!(
                    "channel `{name}` buffer holds {} bytes, rows {lo}..={hi} need {expected}",
                    data.len()
                )));
            }
            sources.push(data);
        }

        for name in frame.names() {
            if geometry.channel_index(name).is_none() {
                debug!(channel = name, "ignoring frame buffer channel not in the layout");
            }
        }
        Ok(sources)
    }
}

/// Shared state of single- and multi-part writers.
struct Engine<W: Write + Seek> {
    out: Option<Tracking<W>>,
    headers: Vec<Header>,
    parts: Vec<PartWriter>,
    multipart: bool,
    codecs: Codecs,
}

/// Headers checked and completed, ready to be written.
struct Prepared {
    headers: Vec<Header>,
    geometries: Vec<Geometry>,
    version: FormatVersion,
}

fn prepare(headers: &[Header], multipart: bool, codecs: &Codecs) -> Result<Prepared> {
    if headers.is_empty() {
        return Err(Error::contract("no part headers given"));
    }

    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(headers.len());
    let mut geometries = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        header.validate()?;
        let compression = header.compression()?;
        if compression != Compression::None {
            codecs.get(compression)?;
        }

        if multipart {
            let name = header
                .name()
                .ok_or_else(|| Error::contract(format!("part {index} has no `name` attribute")))?;
            if !seen.insert(name.to_string()) {
                return Err(Error::contract(format!("duplicate part name `{name}`")));
            }
        }

        let geometry = Geometry::from_header(header)?;
        let mut header = header.clone();
        if multipart || header.contains(names::CHUNK_COUNT) || header.contains(names::TYPE) {
            header.set_part_attributes(geometry.chunk_count())?;
        }
        prepared.push(header);
        geometries.push(geometry);
    }

    let version = FormatVersion {
        single_tiled: !multipart && geometries[0].is_tiled(),
        long_names: prepared.iter().any(Header::has_long_names),
        deep: false,
        multipart,
    };

    Ok(Prepared {
        headers: prepared,
        geometries,
        version,
    })
}

impl<W: Write + Seek> Engine<W> {
    fn start(write: W, prepared: Prepared, multipart: bool, codecs: Codecs) -> Result<Self> {
        let mut out = Tracking::new(write);
        out.write_all(&MAGIC)?;
        write_u32(&mut out, prepared.version.to_word())?;
        for header in &prepared.headers {
            header.attributes().write_to(&mut out)?;
        }
        if multipart {
            out.write_all(&[0])?;
        }

        let mut parts: Vec<PartWriter> = prepared.geometries.into_iter().map(PartWriter::new).collect();
        for part in &mut parts {
            part.table_position = out.position();
            out.write_all(&vec![0; part.offsets.len() * 8])?;
        }

        debug!(
            parts = parts.len(),
            chunks = parts.iter().map(|p| p.offsets.len()).sum::<usize>(),
            multipart,
            "started output"
        );

        Ok(Self {
            out: Some(out),
            headers: prepared.headers,
            parts,
            multipart,
            codecs,
        })
    }

    fn part(&self, part: usize) -> Result<&PartWriter> {
        self.parts
            .get(part)
            .ok_or_else(|| Error::not_found("part", part.to_string()))
    }

    fn write_pixels(&mut self, part: usize, frame: &FrameBuffer<'_>, row_count: usize) -> Result<()> {
        self.part(part)?;
        let Some(out) = self.out.as_mut() else {
            return Err(Error::contract("write after close"));
        };
        let state = &mut self.parts[part];
        let (lo, hi) = state.call_rows(row_count)?;
        let sources = state.sources(frame, lo, hi)?;
        let decreasing = state.geometry.line_order.is_decreasing();

        for i in 0..row_count as i32 {
            let y = if decreasing { hi - i } else { lo + i };
            let index = state.geometry.group_of_row(y);
            let mut group = match state.pending.take() {
                Some(group) if group.index == index => group,
                _ => state.geometry.new_group(index),
            };

            for (slot, channel) in state.geometry.channels().iter().enumerate() {
                if !channel.stores_row(y) {
                    continue;
                }
                let row_bytes = state.geometry.row_bytes(slot);
                let start = sampled_count(lo, y - 1, channel.y_sampling) * row_bytes;
                let src = &sources[slot][start..start + row_bytes];
                ne_to_le(src, channel.pixel_type, group.row_mut(&state.geometry, slot, y));
            }

            if group.mark_row() {
                emit_group(out, &self.codecs, self.multipart.then_some(part), state, &group)?;
            } else {
                state.pending = Some(group);
            }
        }

        state.rows_written += row_count;
        state.next_row += if decreasing {
            -(row_count as i64)
        } else {
            row_count as i64
        };
        trace!(part, lo, hi, "wrote rows");
        Ok(())
    }

    /// Patches the offset tables if every part is complete and flushes.
    ///
    /// Returns the writer unless the output was already closed.
    fn finish(&mut self) -> Result<Option<Tracking<W>>> {
        let Some(mut out) = self.out.take() else {
            return Ok(None);
        };

        let incomplete: Vec<usize> = (0..self.parts.len())
            .filter(|&i| !self.parts[i].is_complete())
            .collect();

        if incomplete.is_empty() {
            for part in &self.parts {
                let table: Vec<u8> = part.offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
                out.patch(part.table_position, &table)?;
            }
        }
        out.flush()?;

        if let Some(&first) = incomplete.first() {
            let part = &self.parts[first];
            return Err(Error::contract(format!(
                "incomplete image: part {first} has {} of {} rows",
                part.rows_written, part.total_rows
            )));
        }

        debug!(bytes = out.position(), "closed output");
        Ok(Some(out))
    }

    fn close(&mut self) -> Result<()> {
        self.finish().map(|_| ())
    }

    fn into_inner(mut self) -> Result<W> {
        self.finish()?
            .map(Tracking::into_inner)
            .ok_or_else(|| Error::contract("output is already closed"))
    }
}

impl<W: Write + Seek> Drop for Engine<W> {
    fn drop(&mut self) {
        if self.out.is_some() {
            if let Err(error) = self.close() {
                warn!(%error, "output dropped without a successful close");
            }
        }
    }
}

/// Compresses the blocks of a full group and appends them as chunks.
fn emit_group<W: Write + Seek>(
    out: &mut Tracking<W>,
    codecs: &Codecs,
    part_number: Option<usize>,
    state: &mut PartWriter,
    group: &RowGroup,
) -> Result<()> {
    let compression = state.geometry.compression;
    for (index, raw) in state.geometry.split(group) {
        let packed = codecs.pack(raw, compression)?;
        state.offsets[index] = out.position();

        if let Some(part) = part_number {
            write_i32(out, part as i32)?;
        }
        match state.geometry.coord(index) {
            BlockCoord::Line(y) => write_i32(out, y)?,
            BlockCoord::Tile { x, y } => {
                for value in [x, y, 0, 0] {
                    write_i32(out, value)?;
                }
            }
        }
        let size = u32::try_from(packed.len())
            .map_err(|_| Error::contract(format!("chunk of {} bytes is too large", packed.len())))?;
        write_u32(out, size)?;
        out.write_all(&packed)?;
        trace!(index, size, "wrote chunk");
    }
    Ok(())
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)?;
    Ok(BufWriter::new(file))
}

// === Public writers ===

/// Single-part writer.
pub struct OutputFile<W: Write + Seek = BufWriter<File>> {
    engine: Engine<W>,
}

impl OutputFile {
    /// Creates `path` and writes the header.
    ///
    /// The header is validated before the file is created.
    pub fn create(path: impl AsRef<Path>, header: &Header) -> Result<Self> {
        Self::create_with_options(path, header, WriteOptions::default())
    }

    pub fn create_with_options(
        path: impl AsRef<Path>,
        header: &Header,
        options: WriteOptions,
    ) -> Result<Self> {
        let prepared = prepare(std::slice::from_ref(header), false, &options.codecs)?;
        let path = path.as_ref();
        debug!(path = %path.display(), "creating output file");
        let engine = Engine::start(create_file(path)?, prepared, false, options.codecs)?;
        Ok(Self { engine })
    }
}

impl<W: Write + Seek> OutputFile<W> {
    /// Writes to any seekable target positioned at its start.
    pub fn from_writer(write: W, header: &Header, options: WriteOptions) -> Result<Self> {
        let prepared = prepare(std::slice::from_ref(header), false, &options.codecs)?;
        let engine = Engine::start(write, prepared, false, options.codecs)?;
        Ok(Self { engine })
    }

    /// Header as written, including any `chunkCount`/`type` set by the writer.
    pub fn header(&self) -> &Header {
        &self.engine.headers[0]
    }

    /// Rows accepted so far.
    pub fn rows_written(&self) -> usize {
        self.engine.parts[0].rows_written
    }

    /// Writes the next `row_count` rows in line order.
    pub fn write_pixels(&mut self, frame: &FrameBuffer<'_>, row_count: usize) -> Result<()> {
        self.engine.write_pixels(0, frame, row_count)
    }

    /// Finalizes the file. Calling it again does nothing.
    ///
    /// Fails if not all rows were written; the file is left without
    /// offsets and readers reject it.
    pub fn close(&mut self) -> Result<()> {
        self.engine.close()
    }

    /// Closes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.engine.into_inner()
    }
}

/// Writer of several independent parts.
pub struct MultiPartOutputFile<W: Write + Seek = BufWriter<File>> {
    engine: Engine<W>,
}

impl MultiPartOutputFile {
    /// Creates `path` with one part per header. Every header needs a unique name.
    pub fn create(path: impl AsRef<Path>, headers: &[Header]) -> Result<Self> {
        Self::create_with_options(path, headers, WriteOptions::default())
    }

    pub fn create_with_options(
        path: impl AsRef<Path>,
        headers: &[Header],
        options: WriteOptions,
    ) -> Result<Self> {
        let prepared = prepare(headers, true, &options.codecs)?;
        let path = path.as_ref();
        debug!(path = %path.display(), parts = headers.len(), "creating multi-part output file");
        let engine = Engine::start(create_file(path)?, prepared, true, options.codecs)?;
        Ok(Self { engine })
    }
}

impl<W: Write + Seek> MultiPartOutputFile<W> {
    pub fn from_writer(write: W, headers: &[Header], options: WriteOptions) -> Result<Self> {
        let prepared = prepare(headers, true, &options.codecs)?;
        let engine = Engine::start(write, prepared, true, options.codecs)?;
        Ok(Self { engine })
    }

    /// Number of parts.
    pub fn parts(&self) -> usize {
        self.engine.parts.len()
    }

    /// Header of `part` as written.
    pub fn header(&self, part: usize) -> Result<&Header> {
        self.engine
            .headers
            .get(part)
            .ok_or_else(|| Error::not_found("part", part.to_string()))
    }

    /// Rows of `part` accepted so far.
    pub fn rows_written(&self, part: usize) -> Result<usize> {
        Ok(self.engine.part(part)?.rows_written)
    }

    /// Writes the next `row_count` rows of `part`.
    pub fn write_pixels(&mut self, part: usize, frame: &FrameBuffer<'_>, row_count: usize) -> Result<()> {
        self.engine.write_pixels(part, frame, row_count)
    }

    /// Finalizes the file once every part is complete. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.engine.close()
    }

    pub fn into_inner(self) -> Result<W> {
        self.engine.into_inner()
    }
}
