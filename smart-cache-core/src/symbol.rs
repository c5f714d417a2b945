//! Symbol Transformer contract (L).
//!
//! Consumed interface only; the rule engine that decides *how* symbols map
//! between provider and standard form lives outside this crate (§1,
//! explicitly out of scope). The core uses this only to normalize inputs
//! before key construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Direction of a symbol mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformDirection {
    /// Provider-specific symbol to the service's standard symbol.
    ToStandard,
    /// Standard symbol back to a provider-specific symbol.
    FromStandard,
}

/// Metadata about one transform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformMetadata {
    /// Wall-clock time spent performing the mapping.
    pub processing_time_ms: u64,
}

/// Result of mapping a batch of symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResult {
    /// Successfully mapped symbols, same order as requested minus failures.
    pub mapped_symbols: Vec<String>,
    /// `(source, destination)` pairs for every symbol that mapped.
    pub mapping_details: Vec<(String, String)>,
    /// Symbols that could not be mapped.
    pub failed_symbols: Vec<String>,
    /// Timing/metadata about the call.
    pub metadata: TransformMetadata,
}

/// Consumed interface for provider-symbol ↔ standard-symbol mapping (§4.10).
#[async_trait]
pub trait SymbolTransformer: Send + Sync {
    /// Maps `symbols` for `provider` in the given `direction`.
    async fn transform(
        &self,
        provider: &str,
        symbols: &[String],
        direction: TransformDirection,
    ) -> Result<TransformResult, CacheError>;
}

/// Identity transformer: every symbol maps to itself. Useful when no
/// provider-specific mapping is configured, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySymbolTransformer;

#[async_trait]
impl SymbolTransformer for IdentitySymbolTransformer {
    async fn transform(
        &self,
        _provider: &str,
        symbols: &[String],
        _direction: TransformDirection,
    ) -> Result<TransformResult, CacheError> {
        let mapping_details = symbols.iter().map(|s| (s.clone(), s.clone())).collect();
        Ok(TransformResult {
            mapped_symbols: symbols.to_vec(),
            mapping_details,
            failed_symbols: Vec::new(),
            metadata: TransformMetadata { processing_time_ms: 0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_transformer_maps_every_symbol_to_itself() {
        let transformer = IdentitySymbolTransformer;
        let result = transformer
            .transform("nasdaq", &["AAPL".to_string(), "MSFT".to_string()], TransformDirection::ToStandard)
            .await
            .unwrap();
        assert_eq!(result.mapped_symbols, vec!["AAPL", "MSFT"]);
        assert!(result.failed_symbols.is_empty());
    }
}
