//! File info command.
//!
//! Prints the version flags, then per part the windows, compression,
//! blocking and channel list. `--all` adds every header attribute.

use crate::InfoArgs;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::trace;
use vfx_imf::{Header, ReadOptions};

/// Runs the info command.
pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    for (index, path) in args.input.iter().enumerate() {
        if index > 0 {
            println!();
        }
        trace!(path = %path.display(), "info::run");
        print_file(path, args.all || verbose > 1)?;
    }
    Ok(())
}

fn print_file(path: &Path, all: bool) -> Result<()> {
    let size = fs::metadata(path)
        .with_context(|| format!("Failed to stat: {}", path.display()))?
        .len();
    let file = super::open(path, ReadOptions::default())?;
    let version = file.version();

    println!("{}", path.display());
    println!("  File size:  {}", super::format_size(size));
    println!("  Parts:      {}", file.parts());
    let mut flags = Vec::new();
    if version.multipart {
        flags.push("multipart");
    }
    if version.single_tiled {
        flags.push("tiled");
    }
    if version.long_names {
        flags.push("long names");
    }
    if !flags.is_empty() {
        println!("  Flags:      {}", flags.join(", "));
    }

    for part in 0..file.parts() {
        let header = file.header(part)?;
        println!("  Part {part}{}", header.name().map(|n| format!(" \"{n}\"")).unwrap_or_default());
        print_header(header, all)?;
    }
    Ok(())
}

fn print_header(header: &Header, all: bool) -> Result<()> {
    let data = header.data_window()?;
    println!("    Data window:    {data} ({}x{})", data.width(), data.height());
    println!("    Display window: {}", header.display_window()?);
    println!("    Compression:    {}", header.compression()?);
    println!("    Line order:     {}", header.line_order()?);
    match header.tile_description() {
        Some(tiles) => println!("    Tiles:          {tiles}"),
        None => println!("    Scanlines:      {} per chunk", header.compression()?.lines_per_block()),
    }
    println!("    Channels:       {}", header.channels()?);

    if all {
        println!("    Attributes:");
        for (name, value) in header.iter() {
            println!("      {name} ({}): {value}", value.type_name());
        }
    }
    Ok(())
}
