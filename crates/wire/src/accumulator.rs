use crate::errors::CodecError;
use crate::varint::decode_remaining_length;

/// Total size of the frame starting at `bytes[0]`, header included.
///
/// `Ok(None)` means the fixed header itself is not complete yet.
pub fn frame_len(bytes: &[u8]) -> Result<Option<usize>, CodecError> {
    let Some(after_type) = bytes.get(1..) else {
        return Ok(None);
    };
    Ok(decode_remaining_length(after_type)?
        .map(|(remaining, length_bytes)| 1 + length_bytes + remaining))
}

/// Reassembles frames from a byte stream that may split or coalesce them
/// arbitrarily across reads.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    max_frame_len: usize,
}

impl FrameAccumulator {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pop the next complete frame, if one is buffered.
    ///
    /// A frame whose declared size exceeds the limit is rejected as soon as
    /// its header is readable, before any of its body is waited for.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        let Some(len) = frame_len(&self.buf)? else {
            return Ok(None);
        };
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if self.buf.len() < len {
            return Ok(None);
        }
        Ok(Some(self.buf.drain(..len).collect()))
    }
}
