//! Closed enumerations stored as a single ordinal byte.
//!
//! Every enum carries a compile-time name table. Decoding an ordinal outside
//! the table is a format error; there is no fallback variant.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

macro_rules! ordinal_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $ordinal:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $ordinal ),+
        }

        impl $name {
            /// All variants in ordinal order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Names of all variants in ordinal order.
            pub const NAMES: &'static [&'static str] = &[$($label),+];

            /// The on-disk ordinal.
            #[inline]
            pub fn ordinal(self) -> u8 {
                self as u8
            }

            /// Decodes an on-disk ordinal.
            pub fn from_ordinal(ordinal: u8) -> Result<Self> {
                match ordinal {
                    $( $ordinal => Ok(Self::$variant), )+
                    other => Err(Error::format(format!("invalid {} ordinal {}", $kind, other))),
                }
            }

            /// The canonical name.
            pub fn name(self) -> &'static str {
                Self::NAMES[self as usize]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == s)
                    .ok_or_else(|| Error::not_found($kind, s))
            }
        }
    };
}

ordinal_enum! {
    /// Storage type of one channel's samples.
    PixelType, "pixel type" {
        /// 32-bit unsigned integer
        Uint = 0 => "UINT",
        /// 16-bit float
        Half = 1 => "HALF",
        /// 32-bit float
        Float = 2 => "FLOAT",
    }
}

impl PixelType {
    /// Bytes per sample.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Self::Half => 2,
            Self::Uint | Self::Float => 4,
        }
    }
}

ordinal_enum! {
    /// Per-chunk compression method.
    Compression, "compression" {
        /// Stored raw
        None = 0 => "NO_COMPRESSION",
        /// Run-length encoding
        Rle = 1 => "RLE_COMPRESSION",
        /// Deflate, one scanline per chunk
        Zips = 2 => "ZIPS_COMPRESSION",
        /// Deflate, 16 scanlines per chunk
        Zip = 3 => "ZIP_COMPRESSION",
        /// Wavelet
        Piz = 4 => "PIZ_COMPRESSION",
        /// Lossy 24-bit float
        Pxr24 = 5 => "PXR24_COMPRESSION",
        /// Lossy 4x4 blocks
        B44 = 6 => "B44_COMPRESSION",
        /// Lossy 4x4 blocks with flat-area shortcut
        B44a = 7 => "B44A_COMPRESSION",
        /// Lossy DCT, 32 scanlines
        Dwaa = 8 => "DWAA_COMPRESSION",
        /// Lossy DCT, 256 scanlines
        Dwab = 9 => "DWAB_COMPRESSION",
    }
}

impl Compression {
    /// Number of scanlines grouped into one chunk of a scanline part.
    pub fn lines_per_block(self) -> usize {
        match self {
            Self::None | Self::Rle | Self::Zips => 1,
            Self::Zip | Self::Pxr24 => 16,
            Self::Piz | Self::B44 | Self::B44a | Self::Dwaa => 32,
            Self::Dwab => 256,
        }
    }

    /// Returns `true` if decoding can change sample values.
    pub fn is_lossy(self) -> bool {
        matches!(
            self,
            Self::Pxr24 | Self::B44 | Self::B44a | Self::Dwaa | Self::Dwab
        )
    }
}

ordinal_enum! {
    /// Order in which scanline chunks appear in the file.
    LineOrder, "line order" {
        /// Top row first
        IncreasingY = 0 => "INCREASING_Y",
        /// Bottom row first
        DecreasingY = 1 => "DECREASING_Y",
        /// Any order
        RandomY = 2 => "RANDOM_Y",
    }
}

impl LineOrder {
    /// Returns `true` if rows are written bottom to top.
    #[inline]
    pub fn is_decreasing(self) -> bool {
        self == Self::DecreasingY
    }
}

ordinal_enum! {
    /// Resolution levels of a tiled part.
    LevelMode, "level mode" {
        /// Full resolution only
        OneLevel = 0 => "ONE_LEVEL",
        /// Square mip levels
        MipmapLevels = 1 => "MIPMAP_LEVELS",
        /// Independent x/y levels
        RipmapLevels = 2 => "RIPMAP_LEVELS",
    }
}

ordinal_enum! {
    /// Rounding of level sizes when a dimension is halved.
    LevelRoundingMode, "level rounding mode" {
        RoundDown = 0 => "ROUND_DOWN",
        RoundUp = 1 => "ROUND_UP",
    }
}

ordinal_enum! {
    /// Environment map projection.
    EnvMap, "environment map" {
        /// Latitude-longitude
        Latlong = 0 => "ENVMAP_LATLONG",
        /// Six cube faces stacked vertically
        Cube = 1 => "ENVMAP_CUBE",
    }
}
