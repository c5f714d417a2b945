//! [`CacheEntry`] — the immutable value stored in the warm tier.

/// An opaque cached value with compression metadata.
///
/// Created by [`Set`](https://docs.rs/smart-cache-common)-style operations,
/// never mutated afterwards, and destroyed on TTL expiry or explicit
/// delete (I1, I3). `data` holds the JSON-text payload when `compressed`
/// is `false`, or base64(gzip) text when `compressed` is `true` — see the
/// warm-tier wire format in spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// JSON text (uncompressed) or base64(gzip) text (compressed).
    pub data: String,
    /// Wall-clock time the entry was written, in epoch milliseconds.
    pub stored_at_ms: i64,
    /// Whether `data` is a base64(gzip) payload.
    pub compressed: bool,
    /// Size, in bytes, of the original JSON encoding (only meaningful when `compressed`).
    pub original_size: Option<usize>,
    /// Size, in bytes, of the compressed payload before base64 (only meaningful when `compressed`).
    pub compressed_size: Option<usize>,
}

impl CacheEntry {
    /// Builds an uncompressed entry.
    pub fn uncompressed(data: String, stored_at_ms: i64) -> Self {
        Self {
            data,
            stored_at_ms,
            compressed: false,
            original_size: None,
            compressed_size: None,
        }
    }

    /// Builds a compressed entry with size metadata.
    pub fn compressed(
        data: String,
        stored_at_ms: i64,
        original_size: usize,
        compressed_size: usize,
    ) -> Self {
        Self {
            data,
            stored_at_ms,
            compressed: true,
            original_size: Some(original_size),
            compressed_size: Some(compressed_size),
        }
    }
}
