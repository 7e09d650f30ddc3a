//! Part header: an attribute store with mandatory fields.
//!
//! A [`Header`] is built before any pixels are written and is fully parsed
//! before any pixels are read. Besides the generic attribute API it offers
//! typed accessors for the mandatory attributes.
//!
//! # Mandatory attributes
//!
//! | name                 | type          |
//! |----------------------|---------------|
//! | `channels`           | `chlist`      |
//! | `compression`        | `compression` |
//! | `dataWindow`         | `box2i`       |
//! | `displayWindow`      | `box2i`       |
//! | `lineOrder`          | `lineOrder`   |
//! | `pixelAspectRatio`   | `float`       |
//! | `screenWindowCenter` | `v2f`         |
//! | `screenWindowWidth`  | `float`       |
//!
//! # Example
//!
//! ```rust
//! use vfx_imf::{Channel, Compression, Header, PixelType};
//!
//! let mut header = Header::new(1920, 1080);
//! header.set_compression(Compression::Rle);
//! header.insert_channel("A", Channel::new(PixelType::Half)).unwrap();
//! header.set_text("owner", "vfx").unwrap();
//!
//! assert_eq!(header.channels().unwrap().len(), 4);
//! header.validate().unwrap();
//! ```

use crate::attribute::{AttributeStore, AttributeType, AttributeValue, Text};
use crate::channel::{Channel, ChannelLayout};
use crate::enums::{Compression, LevelMode, LineOrder, PixelType};
use crate::error::{Error, Result};
use crate::types::{Box2i, TileDescription, V2, V2f};

/// Well-known attribute names.
pub mod names {
    pub const CHANNELS: &str = "channels";
    pub const COMPRESSION: &str = "compression";
    pub const DATA_WINDOW: &str = "dataWindow";
    pub const DISPLAY_WINDOW: &str = "displayWindow";
    pub const LINE_ORDER: &str = "lineOrder";
    pub const PIXEL_ASPECT_RATIO: &str = "pixelAspectRatio";
    pub const SCREEN_WINDOW_CENTER: &str = "screenWindowCenter";
    pub const SCREEN_WINDOW_WIDTH: &str = "screenWindowWidth";
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const CHUNK_COUNT: &str = "chunkCount";
    pub const TILES: &str = "tiles";
    pub const VERSION: &str = "version";
}

/// Mandatory attributes and their type names.
pub const MANDATORY: &[(&str, &str)] = &[
    (names::CHANNELS, "chlist"),
    (names::COMPRESSION, "compression"),
    (names::DATA_WINDOW, "box2i"),
    (names::DISPLAY_WINDOW, "box2i"),
    (names::LINE_ORDER, "lineOrder"),
    (names::PIXEL_ASPECT_RATIO, "float"),
    (names::SCREEN_WINDOW_CENTER, "v2f"),
    (names::SCREEN_WINDOW_WIDTH, "float"),
];

/// Part type of flat scanline images.
pub const SCANLINE_IMAGE: &str = "scanlineimage";
/// Part type of flat tiled images.
pub const TILED_IMAGE: &str = "tiledimage";

/// Largest absolute window coordinate.
pub const WINDOW_LIMIT: i32 = (1 << 30) - 2;

/// Attributes describing one part.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    attributes: AttributeStore,
}

impl Header {
    /// Header for a `width` x `height` image with RGB float channels.
    ///
    /// Data and display window both cover `(0, 0) - (width-1, height-1)`;
    /// compression is ZIP, line order increasing Y.
    pub fn new(width: u32, height: u32) -> Self {
        let window = Box2i::from_size(width, height);
        let mut attributes = AttributeStore::new();
        let mut channels = ChannelLayout::new();
        for name in ["R", "G", "B"] {
            channels.insert_valid(name, Channel::new(PixelType::Float));
        }

        attributes.insert(names::CHANNELS, channels.into());
        attributes.insert(names::COMPRESSION, Compression::Zip.into());
        attributes.insert(names::DATA_WINDOW, window.into());
        attributes.insert(names::DISPLAY_WINDOW, window.into());
        attributes.insert(names::LINE_ORDER, LineOrder::IncreasingY.into());
        attributes.insert(names::PIXEL_ASPECT_RATIO, 1.0_f32.into());
        attributes.insert(names::SCREEN_WINDOW_CENTER, V2::new(0.0_f32, 0.0).into());
        attributes.insert(names::SCREEN_WINDOW_WIDTH, 1.0_f32.into());
        Self { attributes }
    }

    /// Header read from a file, before validation.
    pub(crate) fn from_attributes(attributes: AttributeStore) -> Self {
        Self { attributes }
    }

    /// All attributes in name order.
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    // === Generic access ===

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Result<()> {
        self.attributes.set(name, value)
    }

    pub fn get(&self, name: &str) -> Result<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn get_as<T: AttributeType>(&self, name: &str) -> Result<T> {
        self.attributes.get_as(name)
    }

    /// Sets a `string` attribute; `text` must be ASCII.
    pub fn set_text(&mut self, name: impl Into<String>, text: &str) -> Result<()> {
        self.attributes.set(name, Text::new(text)?)
    }

    /// Sets raw bytes under an explicit type name.
    pub fn set_opaque(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.attributes.set_opaque(name, type_name, bytes)
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter()
    }

    // === Mandatory attributes ===

    /// Channel layout.
    pub fn channels(&self) -> Result<&ChannelLayout> {
        match self.get(names::CHANNELS)? {
            AttributeValue::ChannelList(layout) => Ok(layout),
            other => Err(Error::type_mismatch("chlist", other.type_name())),
        }
    }

    /// Replaces the channel layout.
    pub fn set_channels(&mut self, layout: ChannelLayout) {
        self.attributes.insert(names::CHANNELS, layout.into());
    }

    /// Adds one channel to the layout.
    pub fn insert_channel(&mut self, name: impl Into<String>, channel: Channel) -> Result<()> {
        let mut layout = self.channels().cloned().unwrap_or_default();
        layout.insert(name, channel)?;
        self.set_channels(layout);
        Ok(())
    }

    pub fn compression(&self) -> Result<Compression> {
        self.get_as(names::COMPRESSION)
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.attributes.insert(names::COMPRESSION, compression.into());
    }

    /// Pixels that hold data.
    pub fn data_window(&self) -> Result<Box2i> {
        self.get_as(names::DATA_WINDOW)
    }

    pub fn set_data_window(&mut self, window: Box2i) {
        self.attributes.insert(names::DATA_WINDOW, window.into());
    }

    /// Extent of the full image, may differ from the data window.
    pub fn display_window(&self) -> Result<Box2i> {
        self.get_as(names::DISPLAY_WINDOW)
    }

    pub fn set_display_window(&mut self, window: Box2i) {
        self.attributes.insert(names::DISPLAY_WINDOW, window.into());
    }

    pub fn line_order(&self) -> Result<LineOrder> {
        self.get_as(names::LINE_ORDER)
    }

    pub fn set_line_order(&mut self, order: LineOrder) {
        self.attributes.insert(names::LINE_ORDER, order.into());
    }

    pub fn pixel_aspect_ratio(&self) -> Result<f32> {
        self.get_as(names::PIXEL_ASPECT_RATIO)
    }

    pub fn set_pixel_aspect_ratio(&mut self, ratio: f32) {
        self.attributes.insert(names::PIXEL_ASPECT_RATIO, ratio.into());
    }

    pub fn screen_window_center(&self) -> Result<V2f> {
        self.get_as(names::SCREEN_WINDOW_CENTER)
    }

    pub fn set_screen_window_center(&mut self, center: V2f) {
        self.attributes.insert(names::SCREEN_WINDOW_CENTER, center.into());
    }

    pub fn screen_window_width(&self) -> Result<f32> {
        self.get_as(names::SCREEN_WINDOW_WIDTH)
    }

    pub fn set_screen_window_width(&mut self, width: f32) {
        self.attributes.insert(names::SCREEN_WINDOW_WIDTH, width.into());
    }

    // === Part attributes ===

    /// Part name, `None` if unset.
    pub fn name(&self) -> Option<&str> {
        match self.attributes.get(names::NAME) {
            Ok(AttributeValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Sets the part name; must be ASCII.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.set_text(names::NAME, name)
    }

    /// Value of the `type` attribute, `None` if unset.
    pub fn part_type(&self) -> Option<&str> {
        match self.attributes.get(names::TYPE) {
            Ok(AttributeValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Tile layout, `None` for scanline parts.
    pub fn tile_description(&self) -> Option<TileDescription> {
        self.get_as(names::TILES).ok()
    }

    /// Turns the part into a tiled part.
    pub fn set_tile_description(&mut self, tiles: TileDescription) {
        self.attributes.insert(names::TILES, tiles.into());
    }

    /// Returns `true` if the header describes tiles rather than scanlines.
    pub fn is_tiled(&self) -> bool {
        self.contains(names::TILES)
    }

    /// Part type implied by the layout.
    pub fn implied_part_type(&self) -> &'static str {
        if self.is_tiled() {
            TILED_IMAGE
        } else {
            SCANLINE_IMAGE
        }
    }

    /// Value of the `chunkCount` attribute, `None` if unset.
    pub fn chunk_count(&self) -> Option<i32> {
        self.get_as(names::CHUNK_COUNT).ok()
    }

    pub(crate) fn set_part_attributes(&mut self, chunk_count: usize) -> Result<()> {
        let count = i32::try_from(chunk_count)
            .map_err(|_| Error::contract(format!("{chunk_count} chunks do not fit the offset table")))?;
        let kind = Text::new(self.implied_part_type())?;
        self.attributes.insert(names::CHUNK_COUNT, count.into());
        self.attributes.insert(names::TYPE, kind.into());
        Ok(())
    }

    /// Returns `true` if any name in the header needs the long-names flag.
    pub fn has_long_names(&self) -> bool {
        self.attributes.has_long_names()
    }

    // === Validation ===

    /// Checks everything a writer relies on.
    ///
    /// Missing mandatory attributes and bad values are contract violations;
    /// a mandatory attribute of the wrong type is a type error. Deep parts
    /// and multi-level tiles are unsupported.
    pub fn validate(&self) -> Result<()> {
        for &(name, type_name) in MANDATORY {
            let value = self.get(name).map_err(|_| {
                Error::contract(format!("missing mandatory attribute `{name}`"))
            })?;
            if value.type_name() != type_name {
                return Err(Error::type_mismatch(type_name, value.type_name()));
            }
        }

        let data_window = self.data_window()?;
        check_window("data window", &data_window)?;
        check_window("display window", &self.display_window()?)?;

        let ratio = self.pixel_aspect_ratio()?;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::contract(format!("pixel aspect ratio {ratio} is not positive")));
        }
        let width = self.screen_window_width()?;
        if !width.is_finite() {
            return Err(Error::contract("screen window width is not finite"));
        }

        let channels = self.channels()?;
        if channels.is_empty() {
            return Err(Error::contract("header has no channels"));
        }

        let tiles = self.tile_description();
        for (name, channel) in channels.iter() {
            if channel.x_sampling < 1 || channel.y_sampling < 1 {
                return Err(Error::contract(format!("channel `{name}` has zero sampling")));
            }
            if (data_window.min.x as i64).rem_euclid(channel.x_sampling as i64) != 0
                || (data_window.min.y as i64).rem_euclid(channel.y_sampling as i64) != 0
            {
                return Err(Error::contract(format!(
                    "data window origin {} is not aligned to the {}x{} sampling of channel `{name}`",
                    data_window.min, channel.x_sampling, channel.y_sampling
                )));
            }
            if tiles.is_some() && (channel.x_sampling != 1 || channel.y_sampling != 1) {
                return Err(Error::contract(format!(
                    "tiled parts need 1x1 sampling, channel `{name}` has {}x{}",
                    channel.x_sampling, channel.y_sampling
                )));
            }
        }

        if self.contains(names::TILES) && tiles.is_none() {
            let found = self.get(names::TILES)?.type_name().to_string();
            return Err(Error::type_mismatch("tiledesc", found));
        }
        if let Some(tiles) = tiles {
            let limit = i32::MAX as u32;
            if tiles.x_size == 0 || tiles.y_size == 0 || tiles.x_size > limit || tiles.y_size > limit {
                return Err(Error::contract(format!(
                    "invalid tile size {}x{}",
                    tiles.x_size, tiles.y_size
                )));
            }
            if tiles.mode != LevelMode::OneLevel {
                return Err(Error::unsupported(format!("tiled level mode {}", tiles.mode)));
            }
        }

        if let Some(kind) = self.part_type() {
            if kind.starts_with("deep") {
                return Err(Error::unsupported(format!("deep part type `{kind}`")));
            }
            if kind != self.implied_part_type() {
                return Err(Error::contract(format!(
                    "part type `{kind}` does not match a {} layout",
                    self.implied_part_type()
                )));
            }
        }

        Ok(())
    }
}

fn check_window(what: &str, window: &Box2i) -> Result<()> {
    if window.is_empty() {
        return Err(Error::contract(format!("{what} {window} is empty")));
    }
    let coords = [window.min.x, window.min.y, window.max.x, window.max.y];
    if coords.iter().any(|c| c.unsigned_abs() > WINDOW_LIMIT as u32) {
        return Err(Error::contract(format!("{what} {window} exceeds +/-{WINDOW_LIMIT}")));
    }
    Ok(())
}
