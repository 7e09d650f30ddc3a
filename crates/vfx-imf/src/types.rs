//! Primitive value types carried by attributes.
//!
//! All types are plain values with structural equality. Binary encoding
//! lives in [`crate::attribute`]; the only packing done here is the SMPTE
//! time code, whose bit layout is part of the value's definition.

use std::fmt;

use bit_field::BitField;

use crate::enums::{LevelMode, LevelRoundingMode};
use crate::error::{Error, Result};

// === Vectors ===

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct V2<T> {
    pub x: T,
    pub y: T,
}

impl<T> V2<T> {
    /// Creates a vector.
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T: Eq> Eq for V2<T> {}

impl<T: fmt::Display> fmt::Display for V2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct V3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> V3<T> {
    /// Creates a vector.
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: Eq> Eq for V3<T> {}

impl<T: fmt::Display> fmt::Display for V3<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

pub type V2i = V2<i32>;
pub type V2f = V2<f32>;
pub type V3i = V3<i32>;
pub type V3f = V3<f32>;

// === Boxes ===

/// Axis-aligned box with inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Box2<T> {
    pub min: V2<T>,
    pub max: V2<T>,
}

impl<T: Eq> Eq for Box2<T> {}

impl<T> Box2<T> {
    /// Creates a box from its corners.
    pub const fn new(min: V2<T>, max: V2<T>) -> Self {
        Self { min, max }
    }
}

impl<T: PartialOrd> Box2<T> {
    /// A box is empty if `min` exceeds `max` on either axis.
    pub fn is_empty(&self) -> bool {
        !(self.min.x <= self.max.x && self.min.y <= self.max.y)
    }
}

impl<T: fmt::Display> fmt::Display for Box2<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.min, self.max)
    }
}

pub type Box2i = Box2<i32>;
pub type Box2f = Box2<f32>;

impl Box2i {
    /// Box covering `width` x `height` pixels with its origin at (0, 0).
    ///
    /// Sizes beyond `i32::MAX` saturate to a corner at `i32::MAX`.
    pub fn from_size(width: u32, height: u32) -> Self {
        let last = |size: u32| (size as i64 - 1).min(i32::MAX as i64) as i32;
        Self::new(V2::new(0, 0), V2::new(last(width), last(height)))
    }

    /// Number of columns. Zero or negative for empty boxes.
    pub fn width(&self) -> i64 {
        self.max.x as i64 - self.min.x as i64 + 1
    }

    /// Number of rows. Zero or negative for empty boxes.
    pub fn height(&self) -> i64 {
        self.max.y as i64 - self.min.y as i64 + 1
    }

    /// Returns `true` if row `y` lies inside the box.
    pub fn contains_row(&self, y: i32) -> bool {
        self.min.y <= y && y <= self.max.y
    }
}

// === Rational ===

/// Exact fraction, e.g. a frame rate of 24000/1001.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Value as `f64`. Infinite or NaN for a zero denominator.
    pub fn to_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

// === Chromaticities ===

/// CIE xy coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Chromaticity {
    pub x: f32,
    pub y: f32,
}

impl Chromaticity {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Primaries and white point of the stored RGB values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chromaticities {
    pub red: Chromaticity,
    pub green: Chromaticity,
    pub blue: Chromaticity,
    pub white: Chromaticity,
}

impl Default for Chromaticities {
    /// Rec. 709 primaries with a D65 white point.
    fn default() -> Self {
        Self {
            red: Chromaticity::new(0.64, 0.33),
            green: Chromaticity::new(0.30, 0.60),
            blue: Chromaticity::new(0.15, 0.06),
            white: Chromaticity::new(0.3127, 0.3290),
        }
    }
}

impl fmt::Display for Chromaticities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "r({}, {}) g({}, {}) b({}, {}) w({}, {})",
            self.red.x,
            self.red.y,
            self.green.x,
            self.green.y,
            self.blue.x,
            self.blue.y,
            self.white.x,
            self.white.y
        )
    }
}

// === TimeCode ===

/// SMPTE time code with its flags and 32 bits of user data.
///
/// Kept as the two stored words: time and flags in TV60 packing (BCD
/// digits), then the user data. Accessors decode on demand, so a word read
/// from a file is written back unchanged even if its digits are not
/// canonical BCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeCode {
    /// Time and flags in TV60 packing.
    pub time_and_flags: u32,
    /// Eight 4-bit binary groups.
    pub user_data: u32,
}

macro_rules! time_code_fields {
    ($($get:ident, $set:ident, $bits:expr, $max:expr, $label:literal;)+) => {
        $(
            #[doc = concat!("Decoded ", $label, ".")]
            pub fn $get(&self) -> u8 {
                from_bcd(self.time_and_flags.get_bits($bits))
            }

            #[doc = concat!("Sets the ", $label, ", at most ", stringify!($max), ".")]
            pub fn $set(&mut self, value: u8) -> Result<()> {
                if value > $max {
                    return Err(Error::contract(format!(
                        "time code {} {value} > {}",
                        $label, $max
                    )));
                }
                self.time_and_flags.set_bits($bits, to_bcd(value));
                Ok(())
            }
        )+
    };
}

macro_rules! time_code_flags {
    ($($get:ident, $set:ident, $bit:expr;)+) => {
        $(
            pub fn $get(&self) -> bool {
                self.time_and_flags.get_bit($bit)
            }

            pub fn $set(&mut self, value: bool) {
                self.time_and_flags.set_bit($bit, value);
            }
        )+
    };
}

impl TimeCode {
    /// Time code at the given time with all flags cleared.
    pub fn new(hours: u8, minutes: u8, seconds: u8, frame: u8) -> Result<Self> {
        let mut tc = Self::default();
        tc.set_hours(hours)?;
        tc.set_minutes(minutes)?;
        tc.set_seconds(seconds)?;
        tc.set_frame(frame)?;
        Ok(tc)
    }

    /// Time code from its stored words, kept bit for bit.
    pub const fn unpack(time_and_flags: u32, user_data: u32) -> Self {
        Self {
            time_and_flags,
            user_data,
        }
    }

    time_code_fields! {
        frame, set_frame, 0..6, 29, "frame";
        seconds, set_seconds, 8..15, 59, "seconds";
        minutes, set_minutes, 16..23, 59, "minutes";
        hours, set_hours, 24..30, 23, "hours";
    }

    time_code_flags! {
        drop_frame, set_drop_frame, 6;
        color_frame, set_color_frame, 7;
        field_phase, set_field_phase, 15;
        bgf0, set_bgf0, 23;
        bgf1, set_bgf1, 30;
        bgf2, set_bgf2, 31;
    }

    /// One 4-bit binary group of the user data, `index` in `0..8`.
    pub fn binary_group(&self, index: usize) -> Result<u8> {
        let low = group_bits(index)?;
        Ok(self.user_data.get_bits(low..low + 4) as u8)
    }

    /// Sets one 4-bit binary group, `index` in `0..8`, `value` masked to 4 bits.
    pub fn set_binary_group(&mut self, index: usize, value: u8) -> Result<()> {
        let low = group_bits(index)?;
        self.user_data.set_bits(low..low + 4, (value & 0x0f) as u32);
        Ok(())
    }
}

fn group_bits(index: usize) -> Result<usize> {
    if index < 8 {
        Ok(index * 4)
    } else {
        Err(Error::contract(format!("binary group {index} is not in 0..8")))
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.drop_frame() { ';' } else { ':' };
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hours(),
            self.minutes(),
            self.seconds(),
            sep,
            self.frame()
        )?;
        if self.user_data != 0 {
            write!(f, " user {:#010x}", self.user_data)?;
        }
        Ok(())
    }
}

fn to_bcd(value: u8) -> u32 {
    ((value / 10) as u32) << 4 | (value % 10) as u32
}

fn from_bcd(bits: u32) -> u8 {
    ((bits >> 4) * 10 + (bits & 0x0f)) as u8
}

// === KeyCode ===

/// Film edge code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyCode {
    pub film_mfc_code: i32,
    pub film_type: i32,
    pub prefix: i32,
    pub count: i32,
    pub perf_offset: i32,
    pub perfs_per_frame: i32,
    pub perfs_per_count: i32,
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mfc {} type {} prefix {} count {} offset {} perfs/frame {} perfs/count {}",
            self.film_mfc_code,
            self.film_type,
            self.prefix,
            self.count,
            self.perf_offset,
            self.perfs_per_frame,
            self.perfs_per_count
        )
    }
}

// === Matrices ===

/// Row-major 3x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct M33f(pub [f32; 9]);

impl Default for M33f {
    fn default() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

/// Row-major 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct M44f(pub [f32; 16]);

impl Default for M44f {
    fn default() -> Self {
        let mut m = [0.0; 16];
        for i in 0..4 {
            m[i * 5] = 1.0;
        }
        Self(m)
    }
}

fn fmt_rows(f: &mut fmt::Formatter<'_>, values: &[f32], n: usize) -> fmt::Result {
    f.write_str("[")?;
    for (i, row) in values.chunks(n).enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{row:?}")?;
    }
    f.write_str("]")
}

impl fmt::Display for M33f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_rows(f, &self.0, 3)
    }
}

impl fmt::Display for M44f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_rows(f, &self.0, 4)
    }
}

// === Preview ===

/// Small 8-bit RGBA thumbnail, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preview {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Preview {
    /// Creates a preview; `pixels` must hold `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::contract(format!(
                "preview {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} RGBA8", self.width, self.height)
    }
}

// === TileDescription ===

/// Tile size and level structure of a tiled part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDescription {
    pub x_size: u32,
    pub y_size: u32,
    pub mode: LevelMode,
    pub rounding: LevelRoundingMode,
}

impl TileDescription {
    /// Single-level tiles of the given size.
    pub fn new(x_size: u32, y_size: u32) -> Self {
        Self {
            x_size,
            y_size,
            mode: LevelMode::OneLevel,
            rounding: LevelRoundingMode::RoundDown,
        }
    }

    /// Packed mode byte: level mode in the low nibble, rounding in the high.
    pub fn mode_byte(&self) -> u8 {
        self.mode.ordinal() + self.rounding.ordinal() * 16
    }

    /// Splits a packed mode byte.
    pub fn split_mode_byte(byte: u8) -> Result<(LevelMode, LevelRoundingMode)> {
        Ok((
            LevelMode::from_ordinal(byte & 0x0f)?,
            LevelRoundingMode::from_ordinal(byte >> 4)?,
        ))
    }
}

impl Default for TileDescription {
    fn default() -> Self {
        Self::new(64, 64)
    }
}

impl fmt::Display for TileDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} {}",
            self.x_size, self.y_size, self.mode, self.rounding
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_empty() {
        assert!(!Box2i::from_size(1, 1).is_empty());
        assert!(Box2i::new(V2::new(0, 5), V2::new(10, 4)).is_empty());
        assert!(Box2f::new(V2::new(1.0, 0.0), V2::new(0.0, 1.0)).is_empty());
        assert_eq!(Box2i::from_size(640, 480).width(), 640);
        assert_eq!(Box2i::from_size(640, 480).height(), 480);
        assert!(Box2i::from_size(0, 4).is_empty());
        assert_eq!(Box2i::from_size(1 << 31, u32::MAX).max, V2::new(i32::MAX, i32::MAX));
    }

    #[test]
    fn test_timecode_pack() {
        let mut tc = TimeCode::new(12, 34, 56, 21).unwrap();
        tc.set_drop_frame(true);
        tc.set_bgf2(true);
        tc.user_data = 0xdead_beef;

        let word = tc.time_and_flags;
        assert_eq!(word.get_bits(0..6), 0x21);
        assert_eq!(word.get_bits(8..15), 0x56);
        assert_eq!(word.get_bits(16..23), 0x34);
        assert_eq!(word.get_bits(24..30), 0x12);
        assert!(word.get_bit(6));
        assert!(word.get_bit(31));
        assert!(!word.get_bit(30));
        assert_eq!(TimeCode::unpack(word, tc.user_data), tc);
        assert_eq!((tc.hours(), tc.minutes(), tc.seconds(), tc.frame()), (12, 34, 56, 21));
    }

    #[test]
    fn test_timecode_keeps_non_bcd_word() {
        // frame units nibble 0xa is not a BCD digit
        let tc = TimeCode::unpack(0x0000_000a, 0);
        assert_eq!(tc.frame(), 10);
        assert_eq!(tc.time_and_flags, 0x0000_000a);

        let mut edited = tc;
        edited.set_hours(1).unwrap();
        assert_eq!(edited.time_and_flags, 0x0100_000a);
    }

    #[test]
    fn test_timecode_ranges() {
        assert!(TimeCode::new(24, 0, 0, 0).unwrap_err().is_contract_violation());
        assert!(TimeCode::new(0, 60, 0, 0).is_err());
        assert!(TimeCode::new(0, 0, 60, 0).is_err());
        assert!(TimeCode::new(0, 0, 0, 30).is_err());
        assert!(TimeCode::new(23, 59, 59, 29).is_ok());
    }

    #[test]
    fn test_binary_groups() {
        let mut tc = TimeCode::default();
        tc.set_binary_group(0, 0xa).unwrap();
        tc.set_binary_group(7, 0x3).unwrap();
        assert_eq!(tc.user_data, 0x3000_000a);
        assert_eq!(tc.binary_group(7).unwrap(), 3);
        assert!(tc.binary_group(8).unwrap_err().is_contract_violation());
        assert!(tc.set_binary_group(8, 1).is_err());
        assert_eq!(tc.user_data, 0x3000_000a);
    }

    #[test]
    fn test_tile_mode_byte() {
        let mut td = TileDescription::new(32, 16);
        td.mode = LevelMode::RipmapLevels;
        td.rounding = LevelRoundingMode::RoundUp;
        assert_eq!(td.mode_byte(), 0x12);
        assert_eq!(
            TileDescription::split_mode_byte(0x12).unwrap(),
            (LevelMode::RipmapLevels, LevelRoundingMode::RoundUp)
        );
        assert!(TileDescription::split_mode_byte(0x03).is_err());
    }

    #[test]
    fn test_preview_size_check() {
        assert!(Preview::new(2, 2, vec![0; 16]).is_ok());
        assert!(Preview::new(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Rational::new(24000, 1001).to_string(), "24000/1001");
        assert_eq!(
            TimeCode::new(1, 2, 3, 4).unwrap().to_string(),
            "01:02:03:04"
        );
        assert_eq!(Box2i::from_size(2, 3).to_string(), "(0, 0) - (1, 2)");
    }
}
