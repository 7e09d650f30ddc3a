//! Integrity check command.
//!
//! Opening a file validates its headers and offset tables; reading every
//! channel of every part then decodes each chunk once.

use crate::CheckArgs;
use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use vfx_imf::{ReadOptions, format};

/// Runs the check command. Fails if any input is broken.
pub fn run(args: CheckArgs, verbose: u8) -> Result<()> {
    let options = ReadOptions::default().with_parallel(!args.serial);
    let mut failed = 0;

    for path in &args.input {
        let start = Instant::now();
        match check_file(path, options.clone()) {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "file is intact");
                if verbose > 0 {
                    println!(
                        "OK    {} ({} of pixels in {:.1?})",
                        path.display(),
                        super::format_size(bytes),
                        start.elapsed()
                    );
                } else {
                    println!("OK    {}", path.display());
                }
            }
            Err(error) => {
                failed += 1;
                println!("FAIL  {}: {error:#}", path.display());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files failed the check", args.input.len());
    }
    Ok(())
}

/// Decodes every channel; returns the number of pixel bytes read.
fn check_file(path: &Path, options: ReadOptions) -> Result<u64> {
    let mut magic = Vec::with_capacity(4);
    File::open(path)
        .and_then(|f| f.take(4).read_to_end(&mut magic))
        .with_context(|| format!("Failed to open: {}", path.display()))?;
    if !format::is_container(&magic) {
        bail!("not an image container");
    }

    let mut file = super::open(path, options)?;
    let mut bytes = 0u64;
    for part in 0..file.parts() {
        let names: Vec<String> = file.header(part)?.channels()?.names().map(str::to_string).collect();
        let planes = file.channels(part, &names)?;
        debug!(part, channels = names.len(), "decoded part");
        bytes += planes.iter().map(|p| p.len() as u64).sum::<u64>();
    }
    Ok(bytes)
}
