//! Re-encode command.
//!
//! Reads every part in its stored channel types and writes it back with the
//! same headers, optionally switching the compression of all parts.

use crate::CopyArgs;
use anyhow::{Context, Result};
use tracing::{debug, info, trace};
use vfx_imf::{FrameBuffer, Header, MultiPartOutputFile, OutputFile, ReadOptions, WriteOptions};

/// Runs the copy command.
pub fn run(args: CopyArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "copy::run");

    let compression = args
        .compression
        .as_deref()
        .map(super::parse_compression)
        .transpose()?;

    let mut input = super::open(&args.input, ReadOptions::default())?;
    let multipart = input.version().multipart;

    let mut headers = Vec::with_capacity(input.parts());
    let mut planes = Vec::with_capacity(input.parts());
    for part in 0..input.parts() {
        let mut header: Header = input.header(part)?.clone();
        if let Some(compression) = compression {
            header.set_compression(compression);
        }
        let names: Vec<String> = header.channels()?.names().map(str::to_string).collect();
        let data = input
            .channels(part, &names)
            .with_context(|| format!("Failed to read part {part} of {}", args.input.display()))?;
        debug!(part, channels = names.len(), "read part");
        planes.push(names.into_iter().zip(data).collect::<Vec<_>>());
        headers.push(header);
    }

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        parts = headers.len(),
        compression = ?compression,
        "Copying file"
    );
    if verbose > 0 {
        println!("Copying {} -> {}", args.input.display(), args.output.display());
    }

    let options = WriteOptions::default().with_zip_level(args.zip_level);
    let failed = || format!("Failed to write: {}", args.output.display());

    if multipart {
        let mut output = MultiPartOutputFile::create_with_options(&args.output, &headers, options)
            .with_context(failed)?;
        for (part, (header, channels)) in headers.iter().zip(&planes).enumerate() {
            let frame = frame_of(channels);
            output
                .write_pixels(part, &frame, header.data_window()?.height() as usize)
                .with_context(failed)?;
        }
        output.close().with_context(failed)?;
    } else {
        let mut output =
            OutputFile::create_with_options(&args.output, &headers[0], options).with_context(failed)?;
        let frame = frame_of(&planes[0]);
        output
            .write_pixels(&frame, headers[0].data_window()?.height() as usize)
            .with_context(failed)?;
        output.close().with_context(failed)?;
    }

    if verbose > 0 {
        println!("Done");
    }
    Ok(())
}

fn frame_of(channels: &[(String, Vec<u8>)]) -> FrameBuffer<'_> {
    let mut frame = FrameBuffer::new();
    for (name, data) in channels {
        frame.insert(name.as_str(), data);
    }
    frame
}
