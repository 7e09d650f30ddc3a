//! Block geometry of one part.
//!
//! Pixels are stored in chunks. A scanline part groups
//! [`Compression::lines_per_block`] rows into one chunk; a tiled part cuts
//! every row of tiles into `ceil(width / tile_width)` chunks. Both cases are
//! handled as *row groups*: horizontal bands of the data window, each split
//! into one or more blocks.
//!
//! Inside a raw (uncompressed) block the data is ordered by row, then by
//! channel in name order, and holds only the samples the channel stores on
//! that row, all little-endian.

use std::ops::RangeInclusive;

use smallvec::SmallVec;

use crate::channel::{Channel, sampled_count};
use crate::enums::{Compression, LineOrder};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::types::Box2i;

/// Per-channel values, one slot per channel in name order.
pub type ChannelSlots<T> = SmallVec<[T; 5]>;

/// How a part is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocks {
    /// Bands of `lines` full-width rows.
    ScanLines { lines: usize },
    /// Tiles of `width` x `height` pixels.
    Tiles { width: usize, height: usize },
}

/// Position of a chunk as written in its chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCoord {
    /// First row of a scanline block.
    Line(i32),
    /// Tile column and row.
    Tile { x: i32, y: i32 },
}

/// Chunk layout of one part, derived from a validated header.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub data_window: Box2i,
    pub compression: Compression,
    pub line_order: LineOrder,
    pub blocks: Blocks,
    names: ChannelSlots<String>,
    channels: ChannelSlots<Channel>,
    row_bytes: ChannelSlots<usize>,
    group_height: usize,
    group_count: usize,
    tiles_x: usize,
}

impl Geometry {
    /// Geometry of a header that already passed [`Header::validate`].
    pub fn from_header(header: &Header) -> Result<Self> {
        let data_window = header.data_window()?;
        let compression = header.compression()?;
        let line_order = header.line_order()?;
        let layout = header.channels()?;

        let blocks = match header.tile_description() {
            Some(tiles) => Blocks::Tiles {
                width: tiles.x_size as usize,
                height: tiles.y_size as usize,
            },
            None => Blocks::ScanLines {
                lines: compression.lines_per_block(),
            },
        };

        let width = data_window.width() as usize;
        let height = data_window.height() as usize;
        let (group_height, tiles_x) = match blocks {
            Blocks::ScanLines { lines } => (lines, 1),
            Blocks::Tiles { width: tw, height: th } => (th, width.div_ceil(tw)),
        };

        Ok(Self {
            data_window,
            compression,
            line_order,
            blocks,
            names: layout.names().map(str::to_string).collect(),
            channels: layout.iter().map(|(_, c)| *c).collect(),
            row_bytes: layout
                .iter()
                .map(|(_, c)| c.bytes_per_row(&data_window))
                .collect(),
            group_height,
            group_count: height.div_ceil(group_height),
            tiles_x,
        })
    }

    /// Returns `true` for tiled parts.
    pub fn is_tiled(&self) -> bool {
        matches!(self.blocks, Blocks::Tiles { .. })
    }

    /// Channel names in name order.
    pub fn channel_names(&self) -> &[String] {
        &self.names
    }

    /// Channels in name order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Slot of `name`, if the part has that channel.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Bytes of one stored row of channel `slot`.
    pub fn row_bytes(&self, slot: usize) -> usize {
        self.row_bytes[slot]
    }

    /// Rows per group.
    pub fn group_height(&self) -> usize {
        self.group_height
    }

    /// Number of row groups.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Blocks per row group.
    pub fn tiles_x(&self) -> usize {
        self.tiles_x
    }

    /// Entries in the offset table.
    pub fn chunk_count(&self) -> usize {
        self.group_count * self.tiles_x
    }

    /// First and last row of group `group`.
    pub fn group_rows(&self, group: usize) -> (i32, i32) {
        let lo = self.data_window.min.y as i64 + (group * self.group_height) as i64;
        let hi = (lo + self.group_height as i64 - 1).min(self.data_window.max.y as i64);
        (lo as i32, hi as i32)
    }

    /// Group containing row `y`, which must lie inside the data window.
    pub fn group_of_row(&self, y: i32) -> usize {
        (y as i64 - self.data_window.min.y as i64) as usize / self.group_height
    }

    /// Groups touching rows `lo..=hi`.
    pub fn groups_for_rows(&self, lo: i32, hi: i32) -> RangeInclusive<usize> {
        self.group_of_row(lo)..=self.group_of_row(hi)
    }

    /// First and last column of block `tx` within a group.
    pub fn block_columns(&self, tx: usize) -> (i32, i32) {
        match self.blocks {
            Blocks::ScanLines { .. } => (self.data_window.min.x, self.data_window.max.x),
            Blocks::Tiles { width, .. } => {
                let lo = self.data_window.min.x as i64 + (tx * width) as i64;
                let hi = (lo + width as i64 - 1).min(self.data_window.max.x as i64);
                (lo as i32, hi as i32)
            }
        }
    }

    /// Offset-table index of block `tx` in group `group`.
    pub fn chunk_index(&self, group: usize, tx: usize) -> usize {
        group * self.tiles_x + tx
    }

    /// Chunk-header coordinates of offset-table entry `index`.
    pub fn coord(&self, index: usize) -> BlockCoord {
        let group = index / self.tiles_x;
        match self.blocks {
            Blocks::ScanLines { .. } => BlockCoord::Line(self.group_rows(group).0),
            Blocks::Tiles { .. } => BlockCoord::Tile {
                x: (index % self.tiles_x) as i32,
                y: group as i32,
            },
        }
    }

    /// Offset-table index of a chunk found in the file.
    pub fn index_of(&self, coord: BlockCoord) -> Result<usize> {
        match (self.blocks, coord) {
            (Blocks::ScanLines { .. }, BlockCoord::Line(y)) => {
                let offset = y as i64 - self.data_window.min.y as i64;
                if !self.data_window.contains_row(y) || offset % self.group_height as i64 != 0 {
                    return Err(Error::format(format!("no scanline block starts at row {y}")));
                }
                Ok(offset as usize / self.group_height)
            }
            (Blocks::Tiles { .. }, BlockCoord::Tile { x, y }) => {
                if x < 0 || y < 0 || x as usize >= self.tiles_x || y as usize >= self.group_count {
                    return Err(Error::format(format!("tile ({x}, {y}) is outside the part")));
                }
                Ok(self.chunk_index(y as usize, x as usize))
            }
            _ => Err(Error::format("chunk kind does not match the part layout")),
        }
    }

    /// Size of the raw block `tx` of `group`.
    pub fn raw_block_size(&self, group: usize, tx: usize) -> usize {
        let (lo, hi) = self.group_rows(group);
        let (cx_lo, cx_hi) = self.block_columns(tx);
        self.channels
            .iter()
            .map(|c| {
                c.stored_rows(lo, hi) * sampled_count(cx_lo, cx_hi, c.x_sampling) * c.pixel_type.size()
            })
            .sum()
    }

    /// Empty buffer for group `group`.
    pub fn new_group(&self, group: usize) -> RowGroup {
        let (lo, hi) = self.group_rows(group);
        let rows: usize = (hi - lo + 1) as usize;
        RowGroup {
            index: group,
            lo,
            hi,
            rows,
            rows_filled: 0,
            channels: self
                .channels
                .iter()
                .zip(&self.row_bytes)
                .map(|(c, &bytes)| vec![0; c.stored_rows(lo, hi) * bytes])
                .collect(),
        }
    }

    /// Byte range of the column span `cx_lo..=cx_hi` inside a stored row.
    fn column_span(&self, slot: usize, cx_lo: i32, cx_hi: i32) -> (usize, usize) {
        let channel = &self.channels[slot];
        let size = channel.pixel_type.size();
        let skip = sampled_count(self.data_window.min.x, cx_lo - 1, channel.x_sampling);
        let take = sampled_count(cx_lo, cx_hi, channel.x_sampling);
        (skip * size, (skip + take) * size)
    }

    /// Cuts a complete group into its raw blocks, in offset-table order.
    pub fn split(&self, group: &RowGroup) -> Vec<(usize, Vec<u8>)> {
        (0..self.tiles_x)
            .map(|tx| {
                let (cx_lo, cx_hi) = self.block_columns(tx);
                let mut raw = Vec::with_capacity(self.raw_block_size(group.index, tx));
                for y in group.lo..=group.hi {
                    for (slot, channel) in self.channels.iter().enumerate() {
                        if !channel.stores_row(y) {
                            continue;
                        }
                        let row = group.row(self, slot, y);
                        let (a, b) = self.column_span(slot, cx_lo, cx_hi);
                        raw.extend_from_slice(&row[a..b]);
                    }
                }
                (self.chunk_index(group.index, tx), raw)
            })
            .collect()
    }

    /// Copies raw block `tx` into its place in `group`.
    pub fn scatter(&self, group: &mut RowGroup, tx: usize, raw: &[u8]) -> Result<()> {
        let expected = self.raw_block_size(group.index, tx);
        if raw.len() != expected {
            return Err(Error::format(format!(
                "block holds {} bytes, expected {expected}",
                raw.len()
            )));
        }

        let (cx_lo, cx_hi) = self.block_columns(tx);
        let mut at = 0;
        for y in group.lo..=group.hi {
            for (slot, channel) in self.channels.iter().enumerate() {
                if !channel.stores_row(y) {
                    continue;
                }
                let (a, b) = self.column_span(slot, cx_lo, cx_hi);
                let row = group.row_mut(self, slot, y);
                row[a..b].copy_from_slice(&raw[at..at + (b - a)]);
                at += b - a;
            }
        }
        Ok(())
    }
}

/// One band of rows with a little-endian buffer per channel.
#[derive(Debug, Clone)]
pub struct RowGroup {
    /// Group number within the part.
    pub index: usize,
    /// First row.
    pub lo: i32,
    /// Last row.
    pub hi: i32,
    rows: usize,
    rows_filled: usize,
    channels: ChannelSlots<Vec<u8>>,
}

impl RowGroup {
    fn row_start(&self, geometry: &Geometry, slot: usize, y: i32) -> usize {
        let sampling = geometry.channels[slot].y_sampling;
        sampled_count(self.lo, y - 1, sampling) * geometry.row_bytes[slot]
    }

    /// Stored row `y` of channel `slot`.
    pub fn row(&self, geometry: &Geometry, slot: usize, y: i32) -> &[u8] {
        let start = self.row_start(geometry, slot, y);
        &self.channels[slot][start..start + geometry.row_bytes[slot]]
    }

    /// Mutable stored row `y` of channel `slot`.
    pub fn row_mut(&mut self, geometry: &Geometry, slot: usize, y: i32) -> &mut [u8] {
        let start = self.row_start(geometry, slot, y);
        &mut self.channels[slot][start..start + geometry.row_bytes[slot]]
    }

    /// Counts one more row as written; returns `true` once the group is full.
    pub fn mark_row(&mut self) -> bool {
        self.rows_filled += 1;
        self.rows_filled == self.rows
    }

    /// Rows written so far.
    pub fn rows_filled(&self) -> usize {
        self.rows_filled
    }
}
