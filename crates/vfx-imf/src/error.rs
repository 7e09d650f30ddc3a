//! Error types for container operations.
//!
//! Every failure mode of the crate is one variant of [`Error`]. The variants
//! are distinct on purpose: callers can tell an unreadable path from a broken
//! file, and both from a mistake in their own calls.
//!
//! # Categories
//!
//! - [`Io`](Error::Io) - the file cannot be opened, created or written
//! - [`Format`](Error::Format) - the bytes are not a valid container
//!   (bad magic, malformed attributes, truncated chunk table, ...)
//! - [`Contract`](Error::Contract) - the caller broke an API contract
//!   (missing channel, wrong buffer length, write past the data window, ...)
//! - [`Type`](Error::Type) - a value was requested as an incompatible type
//! - [`NotFound`](Error::NotFound) - no attribute, channel or part of that name
//! - [`Unsupported`](Error::Unsupported) - valid, but not handled here
//!   (deep data, multi-level tiles, a compression without a codec)
//!
//! # Usage
//!
//! ```rust
//! use vfx_imf::{Error, Header};
//!
//! let header = Header::new(64, 32);
//! match header.get("owner") {
//!     Err(Error::NotFound { kind, name }) => {
//!         assert_eq!(kind, "attribute");
//!         assert_eq!(name, "owner");
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, writing or reading a container.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying file or stream failed.
    ///
    /// Opening a missing path or creating a file in a read-only
    /// directory ends up here.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The byte stream is not a valid container.
    ///
    /// Also produced when a stream ends early while it is being parsed.
    #[error("invalid file format: {0}")]
    Format(String),

    /// The caller violated an API contract.
    #[error("contract violation: {0}")]
    Contract(String),

    /// A value was requested as a type it does not have.
    #[error("type mismatch: expected {expected}, found {found}")]
    Type {
        /// Type name that was requested
        expected: String,
        /// Type name that is actually stored
        found: String,
    },

    /// No item with the given name or index exists.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up ("attribute", "channel", "part", ...)
        kind: &'static str,
        /// The name or index that was looked up
        name: String,
    },

    /// The request is valid but this implementation does not handle it.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<io::Error> for Error {
    /// End-of-file while parsing means the input is truncated, which is a
    /// format problem rather than an I/O failure.
    fn from(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Self::Format("unexpected end of data".to_string())
        } else {
            Self::Io(error)
        }
    }
}

impl Error {
    /// Creates an [`Error::Format`] error.
    #[inline]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Creates an [`Error::Contract`] error.
    #[inline]
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    /// Creates an [`Error::Type`] error.
    #[inline]
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Type {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates an [`Error::NotFound`] error.
    #[inline]
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an [`Error::Unsupported`] error.
    #[inline]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Re-labels a header problem found while reading as a format error.
    ///
    /// Header validation reports contract violations because on the write
    /// path the header comes from the caller. On the read path the same
    /// problem means the file is broken.
    pub(crate) fn into_format(self) -> Self {
        match self {
            Self::Contract(message) => Self::Format(message),
            Self::Type { expected, found } => {
                Self::Format(format!("attribute has type {found}, expected {expected}"))
            }
            Self::NotFound { kind, name } => Self::Format(format!("missing {kind} `{name}`")),
            other => other,
        }
    }

    /// Returns `true` if this is an I/O error.
    #[inline]
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns `true` if this is a format error.
    #[inline]
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    /// Returns `true` if this is a contract violation.
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }

    /// Returns `true` if this is a type mismatch.
    #[inline]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::Type { .. })
    }

    /// Returns `true` if this is a lookup failure.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
