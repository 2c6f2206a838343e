//! Canonical error and result types for the crate.
//!
//! Only conditions that break the byte framing of a stream surface as
//! [`AnalyzerError`]. Correlation anomalies are reported as notes on the
//! published events instead.

use thiserror::Error;

use crate::buffer::BufferError;

/// Failure that forces the host to drop a connection.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The stream buffer rejected a payload chunk.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl AnalyzerError {
    /// Whether the error came from the stream size cap.
    #[must_use]
    pub fn is_stream_too_large(&self) -> bool {
        matches!(self, Self::Buffer(BufferError::StreamTooLarge { .. }))
    }
}

/// Canonical result alias used by `flowframe` public APIs.
pub type Result<T> = std::result::Result<T, AnalyzerError>;
