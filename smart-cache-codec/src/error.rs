//! Error taxonomy for the serializer/compressor and decompression governor.

use thiserror::Error;

/// Failure categories for [`crate::envelope::decompress`] (§4.2, I3).
///
/// A [`CodecError`] never fails a read outright — callers fall back to the
/// raw payload and report the tag via metrics.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The envelope's `data` field was not valid base64.
    #[error("base64 decode failed: {0}")]
    Base64DecodeFailed(String),

    /// The decoded bytes were not a valid gzip stream.
    #[error("gzip decompress failed: {0}")]
    GzipDecompressFailed(String),

    /// The decompressed bytes were not valid JSON.
    #[error("json parse failed: {0}")]
    JsonParseFailed(String),

    /// The envelope itself was structurally invalid (missing/wrong-typed fields).
    #[error("metadata invalid: {0}")]
    MetadataInvalid(String),

    /// Any other failure.
    #[error("unknown codec error: {0}")]
    Unknown(String),
}

impl CodecError {
    /// Stable tag used for the `decompression_failed` metric (§4.2).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Base64DecodeFailed(_) => "base64_decode_failed",
            Self::GzipDecompressFailed(_) => "gzip_decompress_failed",
            Self::JsonParseFailed(_) => "json_parse_failed",
            Self::MetadataInvalid(_) => "metadata_invalid",
            Self::Unknown(_) => "unknown_error",
        }
    }
}

/// Failures from the decompression governor's queueing/scheduling layer.
#[derive(Debug, Error)]
pub enum GovernorError {
    /// The bounded queue was full at enqueue time.
    #[error("decompression queue at capacity ({0})")]
    QueueFull(usize),

    /// A task was retried past its retry budget and was rejected.
    #[error("task rejected after {0} attempts")]
    RetriesExhausted(u32),

    /// The underlying decompression failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
