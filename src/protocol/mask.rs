//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an involution: applying the same key twice restores the input.

/// XOR `data` in place with the 4-byte masking key.
///
/// Whole 4-byte words are processed as `u32`, the tail byte by byte.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}
