//! Append-only byte accumulator used by the message parser.
//!
//! [`StreamBuffer`] collects payload chunks for one direction of a
//! connection until a complete unit can be framed. It guards against
//! unbounded growth with an optional cap and remembers how far it has
//! already searched for a delimiter, so feeding a unit one byte at a time
//! still costs linear work overall.

use std::num::NonZeroUsize;

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors raised while accumulating stream bytes.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// Appending the chunk would push the buffered bytes past the cap.
    #[error("stream data too large: {attempted} > {limit}")]
    StreamTooLarge {
        /// Buffered byte count the append would have produced.
        attempted: usize,
        /// Configured maximum.
        limit: NonZeroUsize,
    },
}

/// Growable buffer holding the not yet framed bytes of one stream direction.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    data: BytesMut,
    scanned: usize,
    consumed: usize,
    max_bytes: Option<NonZeroUsize>,
}

impl StreamBuffer {
    /// Create a buffer that rejects appends beyond `max_bytes` buffered bytes.
    ///
    /// `None` disables the cap.
    #[must_use]
    pub fn new(max_bytes: Option<NonZeroUsize>) -> Self {
        Self {
            max_bytes,
            ..Self::default()
        }
    }

    /// Append a payload chunk.
    ///
    /// The buffer is left untouched when the chunk is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::StreamTooLarge`] when the buffered byte count
    /// would exceed the configured maximum.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), BufferError> {
        if let Some(limit) = self.max_bytes {
            let attempted = self.data.len().saturating_add(chunk.len());
            if attempted > limit.get() {
                return Err(BufferError::StreamTooLarge { attempted, limit });
            }
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Split off the next unit terminated by `delimiter`.
    ///
    /// Returns the unit without its delimiter, or `None` when no delimiter
    /// has been buffered yet. In the latter case all bytes are kept and the
    /// next call resumes the search where this one stopped.
    pub fn collect_until(&mut self, delimiter: u8) -> Option<Bytes> {
        let Some(offset) = self.data[self.scanned..]
            .iter()
            .position(|&byte| byte == delimiter)
        else {
            self.scanned = self.data.len();
            return None;
        };

        let end = self.scanned + offset;
        let mut unit = self.data.split_to(end + 1).freeze();
        unit.truncate(end);
        self.consumed = end + 1;
        self.scanned = 0;
        Some(unit)
    }

    /// Bytes consumed by the most recently collected unit, delimiter included.
    #[must_use]
    pub fn consumed(&self) -> usize { self.consumed }

    /// Bytes still buffered and not yet framed.
    #[must_use]
    pub fn len(&self) -> usize { self.data.len() }

    /// Whether no unframed bytes remain.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Forget the unit that was just collected.
    ///
    /// Bytes following that unit stay buffered; they are the start of the
    /// next unit.
    pub fn reset(&mut self) { self.consumed = 0; }

    /// Drop every buffered byte and release the allocation.
    pub fn clear(&mut self) {
        self.data = BytesMut::new();
        self.scanned = 0;
        self.consumed = 0;
    }
}
