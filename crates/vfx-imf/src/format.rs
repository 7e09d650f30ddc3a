//! File-level constants and the version word.
//!
//! Every file starts with [`MAGIC`] followed by a little-endian `u32`
//! version word: the low byte holds the format version ([`VERSION`]), the
//! remaining bits are feature flags.

use crate::error::{Error, Result};

/// Magic number at the start of every file.
pub const MAGIC: [u8; 4] = [0x76, 0x2f, 0x31, 0x01];

/// File format version written and accepted by this crate.
pub const VERSION: u8 = 2;

/// Single-part file whose part is tiled.
pub const TILED_FLAG: u32 = 0x200;

/// Some attribute, type or channel name is longer than 31 bytes.
pub const LONG_NAMES_FLAG: u32 = 0x400;

/// File contains deep data.
pub const NON_IMAGE_FLAG: u32 = 0x800;

/// File contains more than one header.
pub const MULTIPART_FLAG: u32 = 0x1000;

const VERSION_MASK: u32 = 0xff;
const KNOWN_FLAGS: u32 = TILED_FLAG | LONG_NAMES_FLAG | NON_IMAGE_FLAG | MULTIPART_FLAG;

/// Longest name allowed when [`LONG_NAMES_FLAG`] is not set.
pub const SHORT_NAME_LIMIT: usize = 31;

/// Longest name allowed at all.
pub const LONG_NAME_LIMIT: usize = 255;

/// Decoded form of the version word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatVersion {
    /// Single-part tiled file.
    pub single_tiled: bool,
    /// Names up to 255 bytes may occur.
    pub long_names: bool,
    /// Deep data present.
    pub deep: bool,
    /// Header list with multiple entries.
    pub multipart: bool,
}

impl FormatVersion {
    /// Encodes the flags together with [`VERSION`].
    pub fn to_word(self) -> u32 {
        let mut word = VERSION as u32;
        if self.single_tiled {
            word |= TILED_FLAG;
        }
        if self.long_names {
            word |= LONG_NAMES_FLAG;
        }
        if self.deep {
            word |= NON_IMAGE_FLAG;
        }
        if self.multipart {
            word |= MULTIPART_FLAG;
        }
        word
    }

    /// Decodes a version word, rejecting other versions and unknown flags.
    pub fn from_word(word: u32) -> Result<Self> {
        let version = word & VERSION_MASK;
        if version != VERSION as u32 {
            return Err(Error::format(format!(
                "unsupported file version {version}, expected {VERSION}"
            )));
        }

        let flags = word & !VERSION_MASK;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(Error::format(format!("unknown version flags {flags:#x}")));
        }

        let version = Self {
            single_tiled: flags & TILED_FLAG != 0,
            long_names: flags & LONG_NAMES_FLAG != 0,
            deep: flags & NON_IMAGE_FLAG != 0,
            multipart: flags & MULTIPART_FLAG != 0,
        };

        if version.single_tiled && (version.multipart || version.deep) {
            return Err(Error::format(
                "single-part tiled flag combined with multi-part or deep flag",
            ));
        }

        Ok(version)
    }

    /// Longest name permitted under these flags.
    pub fn name_limit(self) -> usize {
        if self.long_names {
            LONG_NAME_LIMIT
        } else {
            SHORT_NAME_LIMIT
        }
    }
}

/// The file format version this crate writes.
pub const fn current_version() -> u8 {
    VERSION
}

/// Returns `true` if `bytes` starts with [`MAGIC`].
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}
