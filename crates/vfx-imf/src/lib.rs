//! # vfx-imf
//!
//! Reader and writer for multi-channel, chunked raster images in the
//! OpenEXR 2 file layout.
//!
//! A file holds one or more *parts*. Each part has a [`Header`] of typed,
//! named attributes and a set of independently typed and sub-sampled
//! channels, stored in scanline blocks or tiles and compressed per chunk.
//!
//! - [`Header`], [`AttributeStore`], [`AttributeValue`] - metadata model
//! - [`ChannelLayout`], [`Channel`] - per-channel storage description
//! - [`OutputFile`], [`MultiPartOutputFile`] - incremental writers
//! - [`InputFile`], [`MultiPartInputFile`] - on-demand readers
//! - [`Codecs`] - pluggable chunk compression
//!
//! ## Example
//!
//! ```
//! use std::io::Cursor;
//! use vfx_imf::{
//!     ChannelLayout, FrameBuffer, Header, InputFile, OutputFile, PixelType, ReadOptions,
//!     WriteOptions, convert,
//! };
//!
//! let mut header = Header::new(8, 4);
//! header.set_channels(ChannelLayout::uniform(&["Y"], PixelType::Half)?);
//! header.set_text("owner", "lighting")?;
//!
//! let luma = convert::floats_to_bytes(&[0.25; 32]);
//! let luma = convert::convert(&luma, PixelType::Float, PixelType::Half)?;
//!
//! let mut out = OutputFile::from_writer(Cursor::new(Vec::new()), &header, WriteOptions::default())?;
//! out.write_pixels(&FrameBuffer::new().with("Y", &luma), 4)?;
//! let bytes = out.into_inner()?.into_inner();
//!
//! let mut file = InputFile::from_reader(Cursor::new(bytes), ReadOptions::default())?;
//! assert_eq!(file.header().get_as::<vfx_imf::Text>("owner")?.as_str(), "lighting");
//! let values = convert::bytes_to_floats(&file.channel_as("Y", PixelType::Float)?);
//! assert!(values.iter().all(|v| *v == 0.25));
//! # Ok::<(), vfx_imf::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` - decompress the chunks of a read request in parallel (enabled by default)

pub mod attribute;
pub mod block;
pub mod channel;
pub mod compression;
pub mod convert;
pub mod enums;
pub mod error;
pub mod format;
pub mod header;
pub mod input;
pub mod io;
pub mod options;
pub mod output;
pub mod types;

pub use attribute::{AttributeStore, AttributeType, AttributeValue, Text};
pub use channel::{Channel, ChannelLayout};
pub use compression::{Codec, Codecs, NoCodec, RleCodec, ZipCodec};
pub use enums::{Compression, EnvMap, LevelMode, LevelRoundingMode, LineOrder, PixelType};
pub use error::{Error, Result};
pub use format::{FormatVersion, current_version};
pub use header::Header;
pub use input::{InputFile, MultiPartInputFile};
pub use options::{ReadOptions, WriteOptions};
pub use output::{FrameBuffer, MultiPartOutputFile, OutputFile};
pub use types::*;

/// Version of this library.
pub fn library_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions() {
        assert_eq!(current_version(), 2);
        assert!(!library_version().is_empty());
    }
}
