//! Writer and reader configuration.
//!
//! ```
//! use vfx_imf::{ReadOptions, WriteOptions};
//!
//! let write = WriteOptions::default().with_zip_level(9);
//! let read = ReadOptions {
//!     parallel: false,
//!     ..Default::default()
//! };
//! # let _ = (write, read);
//! ```

use crate::compression::{Codec, Codecs, ZipCodec};
use crate::enums::Compression;

/// Default cap on a single attribute payload, 256 MiB.
pub const DEFAULT_MAX_ATTRIBUTE_SIZE: usize = 1 << 28;

/// Options for [`OutputFile`](crate::OutputFile) and
/// [`MultiPartOutputFile`](crate::MultiPartOutputFile).
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Codecs used to compress chunks. Default: [`Codecs::builtin`].
    pub codecs: Codecs,
}

impl WriteOptions {
    /// Sets the deflate level (0..=10) for `ZIP` and `ZIPS` chunks.
    pub fn with_zip_level(mut self, level: u8) -> Self {
        let codec = ZipCodec::new(level);
        self.codecs.register(Compression::Zips, codec);
        self.codecs.register(Compression::Zip, codec);
        self
    }

    /// Registers a codec for one compression method.
    pub fn with_codec(mut self, compression: Compression, codec: impl Codec + 'static) -> Self {
        self.codecs.register(compression, codec);
        self
    }
}

/// Options for [`InputFile`](crate::InputFile) and
/// [`MultiPartInputFile`](crate::MultiPartInputFile).
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Codecs used to decompress chunks. Default: [`Codecs::builtin`].
    pub codecs: Codecs,
    /// Decompress the chunks of one request in parallel. Default: `true`.
    ///
    /// Has no effect without the `rayon` feature.
    pub parallel: bool,
    /// Largest attribute payload accepted, in bytes.
    pub max_attribute_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            codecs: Codecs::builtin(),
            parallel: true,
            max_attribute_size: DEFAULT_MAX_ATTRIBUTE_SIZE,
        }
    }
}

impl ReadOptions {
    pub fn with_codec(mut self, compression: Compression, codec: impl Codec + 'static) -> Self {
        self.codecs.register(compression, codec);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_attribute_size(mut self, bytes: usize) -> Self {
        self.max_attribute_size = bytes;
        self
    }

    /// Returns `true` if decoding should fan out over the rayon pool.
    pub(crate) fn decode_in_parallel(&self) -> bool {
        cfg!(feature = "rayon") && self.parallel
    }
}
