#![warn(missing_docs)]
//! Serializer & Compressor (B) and Decompression Governor (D).
//!
//! `envelope` turns typed values into the JSON-or-gzipped-JSON envelope
//! stored in the warm tier; `governor` bounds and schedules the gunzip work
//! that reading a compressed envelope requires.

/// Error taxonomy for both submodules.
pub mod error;

/// JSON envelope encode/decode with threshold-gated compression.
pub mod envelope;

/// Bounded-concurrency decompression scheduling with adaptive control.
pub mod governor;

pub use envelope::{decode, from_wire_json, serialize, to_wire_json, Decoded};
pub use error::{CodecError, GovernorError};
pub use governor::{DecompressionGovernor, GovernorConfig, GovernorMode, NullResourceSampler, ResourceSampler, TaskPriority};
