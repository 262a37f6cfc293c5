//! Variable-length "remaining length" field of the fixed header.
//!
//! Seven bits per byte, least significant group first, with the high bit set
//! while more bytes follow. Four bytes at most.

use crate::errors::CodecError;

/// Largest value representable in four continuation-encoded bytes.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const MAX_ENCODED_BYTES: usize = 4;

/// Append the encoding of `len` to `out`.
pub fn encode_remaining_length(len: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(CodecError::RemainingLengthTooLarge(len));
    }

    let mut value = len;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return Ok(());
        }
    }
}

/// Decode a remaining length from the start of `bytes`.
///
/// Returns `Ok(None)` when `bytes` ends before the terminating byte, so a
/// caller holding a partial read can wait for more data. On success yields
/// the decoded value and the number of bytes it occupied.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;

    for (index, &byte) in bytes.iter().take(MAX_ENCODED_BYTES).enumerate() {
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, index + 1)));
        }
        multiplier *= 128;
    }

    if bytes.len() >= MAX_ENCODED_BYTES {
        Err(CodecError::InvalidRemainingLength)
    } else {
        Ok(None)
    }
}
