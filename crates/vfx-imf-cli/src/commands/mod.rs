//! CLI command implementations

pub mod check;
pub mod copy;
pub mod info;

use anyhow::{Context, Result, bail};
use std::path::Path;
use vfx_imf::{Compression, MultiPartInputFile, ReadOptions};

/// Opens a file with all of its parts.
pub fn open(path: &Path, options: ReadOptions) -> Result<MultiPartInputFile> {
    MultiPartInputFile::open_with_options(path, options)
        .with_context(|| format!("Failed to open: {}", path.display()))
}

/// Parses a compression given as `zip`, `ZIP_COMPRESSION`, `none`, ...
pub fn parse_compression(name: &str) -> Result<Compression> {
    if name.eq_ignore_ascii_case("none") {
        return Ok(Compression::None);
    }
    if let Ok(compression) = name.to_ascii_uppercase().parse::<Compression>() {
        return Ok(compression);
    }
    match Compression::ALL.iter().find(|c| {
        c.name()
            .strip_suffix("_COMPRESSION")
            .is_some_and(|short| short.eq_ignore_ascii_case(name))
    }) {
        Some(compression) => Ok(*compression),
        None => bail!(
            "Unknown compression: {name} (expected one of none, rle, zips, zip, piz, pxr24, b44, b44a, dwaa, dwab)"
        ),
    }
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
