//! Byte reordering and delta prediction shared by the RLE and ZIP codecs.
//!
//! Before entropy coding, the bytes of a raw block are split into two
//! halves (even offsets, then odd offsets) and replaced by their running
//! differences. Decoding applies the inverse steps in reverse order.

/// Moves even-offset bytes to the first half and odd-offset bytes to the second.
pub fn separate_bytes_fragments(source: &mut [u8]) {
    let mut separated = vec![0u8; source.len()];
    let (first, second) = separated.split_at_mut(source.len().div_ceil(2));

    for (i, pair) in source.chunks(2).enumerate() {
        first[i] = pair[0];
        if let Some(&odd) = pair.get(1) {
            second[i] = odd;
        }
    }

    source.copy_from_slice(&separated);
}

/// Inverse of [`separate_bytes_fragments`].
pub fn interleave_byte_blocks(separated: &mut [u8]) {
    let mut interleaved = vec![0u8; separated.len()];
    let (first, second) = separated.split_at(separated.len().div_ceil(2));

    for (i, pair) in interleaved.chunks_mut(2).enumerate() {
        pair[0] = first[i];
        if pair.len() > 1 {
            pair[1] = second[i];
        }
    }

    separated.copy_from_slice(&interleaved);
}

/// Replaces every byte after the first by its difference to the previous one, offset by 128.
pub fn samples_to_differences(buffer: &mut [u8]) {
    if buffer.is_empty() {
        return;
    }
    let mut previous = buffer[0];
    for byte in &mut buffer[1..] {
        let current = *byte;
        *byte = current.wrapping_sub(previous).wrapping_add(128);
        previous = current;
    }
}

/// Inverse of [`samples_to_differences`].
pub fn differences_to_samples(buffer: &mut [u8]) {
    if buffer.is_empty() {
        return;
    }
    let mut previous = buffer[0];
    for byte in &mut buffer[1..] {
        previous = byte.wrapping_add(previous).wrapping_sub(128);
        *byte = previous;
    }
}
