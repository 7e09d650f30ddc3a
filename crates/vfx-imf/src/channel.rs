//! Channel descriptors and the name-ordered channel layout.
//!
//! Channels are kept sorted by name (byte-wise, case-sensitive). That order
//! is the order of the `chlist` attribute and of channel data inside every
//! raw block.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use crate::enums::PixelType;
use crate::error::{Error, Result};
use crate::io::{check_name, read_i32, read_name, write_i32, write_name};
use crate::types::Box2i;

/// Storage description of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub pixel_type: PixelType,
    /// Horizontal sub-sampling, at least 1.
    pub x_sampling: u32,
    /// Vertical sub-sampling, at least 1.
    pub y_sampling: u32,
    /// `pLinear` byte as stored. Non-zero hints that values are
    /// perceptually rather than physically linear.
    pub p_linear: u8,
    /// Reserved bytes after `pLinear`, written back as read.
    pub reserved: [u8; 3],
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(PixelType::Half)
    }
}

impl Channel {
    /// Full-resolution channel of the given type.
    pub const fn new(pixel_type: PixelType) -> Self {
        Self {
            pixel_type,
            x_sampling: 1,
            y_sampling: 1,
            p_linear: 0,
            reserved: [0; 3],
        }
    }

    /// Same channel with the perceptually-linear hint set or cleared.
    pub const fn with_perceptually_linear(self, linear: bool) -> Self {
        Self {
            p_linear: linear as u8,
            ..self
        }
    }

    /// Returns `true` if values are perceptually linear.
    pub fn is_perceptually_linear(&self) -> bool {
        self.p_linear != 0
    }

    /// Same channel with different sub-sampling.
    pub const fn with_sampling(self, x_sampling: u32, y_sampling: u32) -> Self {
        Self {
            x_sampling,
            y_sampling,
            ..self
        }
    }

    /// Returns `true` if row `y` stores samples for this channel.
    #[inline]
    pub fn stores_row(&self, y: i32) -> bool {
        (y as i64).rem_euclid(self.y_sampling as i64) == 0
    }

    /// Number of stored rows in `lo..=hi`.
    #[inline]
    pub fn stored_rows(&self, lo: i32, hi: i32) -> usize {
        sampled_count(lo, hi, self.y_sampling)
    }

    /// Samples in one stored row of `window`.
    #[inline]
    pub fn samples_per_row(&self, window: &Box2i) -> usize {
        sampled_count(window.min.x, window.max.x, self.x_sampling)
    }

    /// Bytes in one stored row of `window`.
    #[inline]
    pub fn bytes_per_row(&self, window: &Box2i) -> usize {
        self.samples_per_row(window) * self.pixel_type.size()
    }

    /// Bytes for the stored rows of `lo..=hi` across `window`.
    pub fn bytes_for_rows(&self, window: &Box2i, lo: i32, hi: i32) -> usize {
        self.stored_rows(lo, hi) * self.bytes_per_row(window)
    }
}

/// Number of multiples of `sampling` in `lo..=hi`.
pub(crate) fn sampled_count(lo: i32, hi: i32, sampling: u32) -> usize {
    if hi < lo {
        return 0;
    }
    let s = sampling.max(1) as i64;
    let first = (lo as i64 + s - 1).div_euclid(s);
    let last = (hi as i64).div_euclid(s);
    (last - first + 1).max(0) as usize
}

/// Ordered mapping from channel name to [`Channel`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelLayout {
    channels: BTreeMap<String, Channel>,
}

impl ChannelLayout {
    /// Empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout of full-resolution channels sharing one type.
    pub fn uniform<S: AsRef<str>>(names: &[S], pixel_type: PixelType) -> Result<Self> {
        let mut layout = Self::new();
        for name in names {
            layout.insert(name.as_ref(), Channel::new(pixel_type))?;
        }
        Ok(layout)
    }

    /// Adds or replaces a channel.
    pub fn insert(&mut self, name: impl Into<String>, channel: Channel) -> Result<()> {
        let name = name.into();
        check_name("channel", &name)?;
        if channel.x_sampling == 0 || channel.y_sampling == 0 {
            return Err(Error::contract(format!(
                "channel `{name}` has zero sampling"
            )));
        }
        self.channels.insert(name, channel);
        Ok(())
    }

    /// Adds a channel whose name and sampling are known to be valid.
    pub(crate) fn insert_valid(&mut self, name: &str, channel: Channel) {
        self.channels.insert(name.to_string(), channel);
    }

    pub fn remove(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Channel)> {
        self.channels.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Position of `name` in name order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.keys().position(|n| n == name)
    }

    /// Bytes of one raw block covering rows `lo..=hi` of `window`.
    pub fn block_bytes(&self, window: &Box2i, lo: i32, hi: i32) -> usize {
        self.channels
            .values()
            .map(|c| c.bytes_for_rows(window, lo, hi))
            .sum()
    }

    /// Longest channel name in bytes.
    pub fn longest_name(&self) -> usize {
        self.channels.keys().map(String::len).max().unwrap_or(0)
    }

    /// Writes the `chlist` payload.
    pub fn write_to<W: Write>(&self, write: &mut W) -> Result<()> {
        for (name, channel) in &self.channels {
            write_name(write, name)?;
            write_i32(write, channel.pixel_type.ordinal() as i32)?;
            write.write_all(&[channel.p_linear])?;
            write.write_all(&channel.reserved)?;
            write_i32(write, channel.x_sampling as i32)?;
            write_i32(write, channel.y_sampling as i32)?;
        }
        write.write_all(&[0])?;
        Ok(())
    }

    /// Reads a `chlist` payload.
    pub fn read_from<R: Read>(read: &mut R, name_limit: usize) -> Result<Self> {
        let mut layout = Self::new();
        loop {
            let name = read_name(read, name_limit)?;
            if name.is_empty() {
                return Ok(layout);
            }

            let pixel_type = read_i32(read)?;
            let pixel_type = u8::try_from(pixel_type)
                .map_err(|_| Error::format(format!("invalid pixel type {pixel_type}")))
                .and_then(PixelType::from_ordinal)?;

            let mut p_linear = [0u8; 1];
            read.read_exact(&mut p_linear)?;
            let mut reserved = [0u8; 3];
            read.read_exact(&mut reserved)?;

            let x_sampling = read_i32(read)?;
            let y_sampling = read_i32(read)?;
            if x_sampling < 1 || y_sampling < 1 {
                return Err(Error::format(format!(
                    "channel `{name}` has sampling {x_sampling}x{y_sampling}"
                )));
            }

            if layout.contains(&name) {
                return Err(Error::format(format!("duplicate channel `{name}`")));
            }

            layout.channels.insert(
                name,
                Channel {
                    pixel_type,
                    x_sampling: x_sampling as u32,
                    y_sampling: y_sampling as u32,
                    p_linear: p_linear[0],
                    reserved,
                },
            );
        }
    }
}

impl<'a> IntoIterator for &'a ChannelLayout {
    type Item = (&'a String, &'a Channel);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, channel)) in self.channels.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name} {}", channel.pixel_type)?;
            if channel.x_sampling != 1 || channel.y_sampling != 1 {
                write!(f, " {}x{}", channel.x_sampling, channel.y_sampling)?;
            }
            if channel.is_perceptually_linear() {
                f.write_str(" plinear")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::V2;

    #[test]
    fn test_sampled_count() {
        assert_eq!(sampled_count(0, 9, 1), 10);
        assert_eq!(sampled_count(0, 9, 2), 5);
        assert_eq!(sampled_count(0, 8, 2), 5);
        assert_eq!(sampled_count(-4, 3, 2), 4);
        assert_eq!(sampled_count(1, 1, 2), 0);
        assert_eq!(sampled_count(5, 4, 1), 0);
    }

    #[test]
    fn test_row_sizes() {
        let window = Box2i::new(V2::new(0, 0), V2::new(9, 5));
        let half = Channel::new(PixelType::Half);
        let sub = Channel::new(PixelType::Float).with_sampling(2, 2);
        assert_eq!(half.bytes_per_row(&window), 20);
        assert_eq!(sub.bytes_per_row(&window), 20);
        assert_eq!(sub.bytes_for_rows(&window, 0, 5), 60);
        assert!(sub.stores_row(-2));
        assert!(!sub.stores_row(3));
    }

    #[test]
    fn test_name_order() {
        let layout = ChannelLayout::uniform(&["G", "B", "R", "A", "a"], PixelType::Half).unwrap();
        let names: Vec<_> = layout.names().collect();
        assert_eq!(names, ["A", "B", "G", "R", "a"]);
        assert_eq!(layout.index_of("G"), Some(2));
    }

    #[test]
    fn test_wire_roundtrip() {
        let mut layout = ChannelLayout::new();
        layout.insert("Y", Channel::new(PixelType::Float)).unwrap();
        layout
            .insert(
                "RY",
                Channel::new(PixelType::Half)
                    .with_sampling(2, 2)
                    .with_perceptually_linear(true),
            )
            .unwrap();
        layout.insert("id", Channel::new(PixelType::Uint)).unwrap();

        let mut bytes = Vec::new();
        layout.write_to(&mut bytes).unwrap();
        // three entries of name + 16 bytes, plus terminator
        assert_eq!(bytes.len(), (2 + 16) + (3 + 16) + (3 + 16) + 1);

        let parsed = ChannelLayout::read_from(&mut bytes.as_slice(), 31).unwrap();
        assert_eq!(parsed, layout);
    }

    #[test]
    fn test_foreign_flag_bytes_survive() {
        let mut bytes = b"depth\0".to_vec();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&[2, 7, 7, 7]);
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(0);

        let layout = ChannelLayout::read_from(&mut bytes.as_slice(), 31).unwrap();
        let depth = layout.get("depth").unwrap();
        assert!(depth.is_perceptually_linear());
        assert_eq!(depth.reserved, [7, 7, 7]);

        let mut written = Vec::new();
        layout.write_to(&mut written).unwrap();
        assert_eq!(written, bytes);
    }

    #[test]
    fn test_rejects_bad_entries() {
        let mut layout = ChannelLayout::new();
        assert!(layout.insert("", Channel::default()).is_err());
        assert!(layout.insert("R", Channel::default().with_sampling(0, 1)).is_err());

        // pixel type 7
        let mut bytes = b"R\0".to_vec();
        bytes.extend_from_slice(&7i32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(0);
        let err = ChannelLayout::read_from(&mut bytes.as_slice(), 31).unwrap_err();
        assert!(err.is_format_error());
    }
}
