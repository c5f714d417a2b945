//! JSON envelope serialization with threshold-gated gzip compression (B, §4.2).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use smart_cache_core::CacheEntry;
use std::io::Read;

use crate::error::CodecError;

/// A savings ratio above this means compression wasn't worth keeping (§4.2).
const MAX_USEFUL_COMPRESSION_RATIO: f64 = 0.9;

/// Encodes `value` as JSON and gzip-compresses it when it clears
/// `compression_threshold_bytes` and the compression is actually worthwhile.
pub fn serialize<T: Serialize>(
    value: &T,
    stored_at_ms: i64,
    compression_threshold_bytes: usize,
    compression_enabled: bool,
) -> Result<CacheEntry, CodecError> {
    let json = serde_json::to_string(value).map_err(|e| CodecError::JsonParseFailed(e.to_string()))?;

    if !compression_enabled || json.len() < compression_threshold_bytes {
        return Ok(CacheEntry::uncompressed(json, stored_at_ms));
    }

    let original_size = json.len();
    let mut encoder = GzEncoder::new(json.as_bytes(), Compression::default());
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .map_err(|e| CodecError::GzipDecompressFailed(e.to_string()))?;
    let compressed_size = compressed.len();

    if compressed_size as f64 / original_size as f64 > MAX_USEFUL_COMPRESSION_RATIO {
        return Ok(CacheEntry::uncompressed(json, stored_at_ms));
    }

    let encoded = BASE64.encode(&compressed);
    Ok(CacheEntry::compressed(encoded, stored_at_ms, original_size, compressed_size))
}

/// The outcome of [`decode`]: either the value parsed cleanly, or decoding
/// failed and the raw envelope text is returned as a fallback (I3).
pub enum Decoded<T> {
    /// Decoding (and, if applicable, decompression) succeeded.
    Parsed(T),
    /// Decoding failed; the read still succeeds with the raw text and an error tag.
    Raw { raw: String, error: CodecError },
}

/// Decodes `entry` into `T`, decompressing first if `entry.compressed`.
///
/// Per I3, this never propagates an error to the caller — on any failure it
/// returns [`Decoded::Raw`] carrying the original envelope text so the read
/// path can still return *something* while a `decompression_failed` metric
/// is recorded by the caller.
pub fn decode<T: DeserializeOwned>(entry: &CacheEntry) -> Decoded<T> {
    let json = if entry.compressed {
        match decompress_text(&entry.data) {
            Ok(text) => text,
            Err(error) => {
                return Decoded::Raw {
                    raw: entry.data.clone(),
                    error,
                }
            }
        }
    } else {
        entry.data.clone()
    };

    match serde_json::from_str(&json) {
        Ok(value) => Decoded::Parsed(value),
        Err(e) => Decoded::Raw {
            raw: entry.data.clone(),
            error: CodecError::JsonParseFailed(e.to_string()),
        },
    }
}

/// On-wire shape of a [`CacheEntry`] (spec.md §6): `metadata` is present
/// only for compressed entries.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    compressed: bool,
    stored_at_ms: i64,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<WireMetadata>,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    original_size: usize,
    compressed_size: usize,
}

/// Renders `entry` as the JSON string stored at the Redis key (§6).
pub fn to_wire_json(entry: &CacheEntry) -> Result<String, CodecError> {
    let wire = WireEnvelope {
        compressed: entry.compressed,
        stored_at_ms: entry.stored_at_ms,
        data: entry.data.clone(),
        metadata: match (entry.original_size, entry.compressed_size) {
            (Some(original_size), Some(compressed_size)) => Some(WireMetadata { original_size, compressed_size }),
            _ => None,
        },
    };
    serde_json::to_string(&wire).map_err(|e| CodecError::JsonParseFailed(e.to_string()))
}

/// Parses a Redis value back into a [`CacheEntry`] (inverse of [`to_wire_json`]).
pub fn from_wire_json(raw: &str) -> Result<CacheEntry, CodecError> {
    let wire: WireEnvelope = serde_json::from_str(raw).map_err(|e| CodecError::JsonParseFailed(e.to_string()))?;
    Ok(match wire.metadata {
        Some(meta) if wire.compressed => CacheEntry::compressed(wire.data, wire.stored_at_ms, meta.original_size, meta.compressed_size),
        _ => CacheEntry::uncompressed(wire.data, wire.stored_at_ms),
    })
}

fn decompress_text(base64_gzip: &str) -> Result<String, CodecError> {
    let compressed = BASE64
        .decode(base64_gzip)
        .map_err(|e| CodecError::Base64DecodeFailed(e.to_string()))?;
    if compressed.len() < 2 || compressed[0] != 0x1f || compressed[1] != 0x8b {
        return Err(CodecError::GzipDecompressFailed("missing gzip magic bytes".into()));
    }
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| CodecError::GzipDecompressFailed(e.to_string()))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        symbol: String,
        price: f64,
    }

    #[test]
    fn small_payload_stays_uncompressed() {
        let payload = Payload { symbol: "AAPL".into(), price: 190.5 };
        let entry = serialize(&payload, 1_000, 1_024, true).unwrap();
        assert!(!entry.compressed);
    }

    #[test]
    fn large_compressible_payload_is_compressed_and_round_trips() {
        let payload = Payload {
            symbol: "AAPL".repeat(500),
            price: 190.5,
        };
        let entry = serialize(&payload, 1_000, 64, true).unwrap();
        assert!(entry.compressed);
        match decode::<Payload>(&entry) {
            Decoded::Parsed(decoded) => assert_eq!(decoded, payload),
            Decoded::Raw { error, .. } => panic!("expected parse success, got {error}"),
        }
    }

    #[test]
    fn incompressible_payload_falls_back_to_uncompressed() {
        // Random-looking ASCII with little redundancy compresses poorly.
        let payload = Payload {
            symbol: "QZJXKVWBNFTYHPLRM".into(),
            price: 1.2345678901234,
        };
        let entry = serialize(&payload, 1_000, 1, true).unwrap();
        // Either path is valid depending on gzip's actual ratio on this tiny
        // input; what matters is that it always round-trips.
        match decode::<Payload>(&entry) {
            Decoded::Parsed(decoded) => assert_eq!(decoded, payload),
            Decoded::Raw { error, .. } => panic!("expected parse success, got {error}"),
        }
    }

    #[test]
    fn wire_json_round_trips_compressed_and_uncompressed_entries() {
        let small = serialize(&Payload { symbol: "AAPL".into(), price: 190.5 }, 1_000, 1_024, true).unwrap();
        let wire = to_wire_json(&small).unwrap();
        assert_eq!(from_wire_json(&wire).unwrap(), small);

        let big = serialize(&Payload { symbol: "AAPL".repeat(500), price: 1.0 }, 2_000, 64, true).unwrap();
        let wire = to_wire_json(&big).unwrap();
        assert_eq!(from_wire_json(&wire).unwrap(), big);
    }

    #[test]
    fn malformed_compressed_envelope_falls_back_to_raw() {
        let entry = CacheEntry::compressed("not-valid-base64!!!".into(), 1_000, 10, 5);
        match decode::<Payload>(&entry) {
            Decoded::Parsed(_) => panic!("expected fallback"),
            Decoded::Raw { raw, error } => {
                assert_eq!(raw, "not-valid-base64!!!");
                assert_eq!(error.tag(), "base64_decode_failed");
            }
        }
    }
}
