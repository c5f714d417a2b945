//! Cache Key Builder (I): deterministic key derivation (§4.8, I7).

use sha1::{Digest, Sha1};
use smart_cache_core::key::CacheKey;

/// Symbol counts above this are hashed instead of joined verbatim.
const HASH_THRESHOLD: usize = 5;

/// Errors from [`build_unified_cache_key`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyBuilderError {
    /// `prefix` was empty.
    #[error("cache key prefix must not be empty")]
    EmptyPrefix,
    /// `symbols` was empty.
    #[error("cache key must have at least one symbol")]
    EmptySymbols,
}

/// Builds a deterministic cache key from `prefix`, `symbols`, and optional `params`.
///
/// - 1 symbol: appended directly.
/// - 2-5 symbols: sorted ascending, joined with `|`.
/// - more than 5: normalized (trim/upper, dedupe, sort), SHA-1 hashed, first
///   16 hex characters appended as `hash:<hex>`.
/// - `params`, if present, are sorted by key and joined as `k:v|...`.
///
/// All segments are joined with `:`. Per I7, the result always has at least
/// two `:`-separated parts and every part is non-empty.
pub fn build_unified_cache_key(
    prefix: &str,
    symbols: &[String],
    params: Option<&[(String, String)]>,
) -> Result<CacheKey, KeyBuilderError> {
    if prefix.is_empty() {
        return Err(KeyBuilderError::EmptyPrefix);
    }
    if symbols.is_empty() {
        return Err(KeyBuilderError::EmptySymbols);
    }

    let mut parts = vec![prefix.to_string()];
    parts.push(symbol_segment(symbols));

    if let Some(params) = params {
        if !params.is_empty() {
            parts.push(param_segment(params));
        }
    }

    debug_assert!(parts.len() >= 2);
    debug_assert!(parts.iter().all(|p| !p.is_empty()));

    Ok(CacheKey::new(parts.join(":")))
}

fn symbol_segment(symbols: &[String]) -> String {
    if symbols.len() == 1 {
        return symbols[0].clone();
    }
    if symbols.len() <= HASH_THRESHOLD {
        let mut sorted: Vec<&str> = symbols.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        return sorted.join("|");
    }

    let mut normalized: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    normalized.sort_unstable();
    normalized.dedup();

    let mut hasher = Sha1::new();
    hasher.update(normalized.join("|").as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    format!("hash:{}", &hex[..16])
}

fn param_segment(params: &[(String, String)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_symbol_is_appended_directly() {
        let key = build_unified_cache_key("quotes", &["AAPL".to_string()], None).unwrap();
        assert_eq!(key.as_str(), "quotes:AAPL");
    }

    #[test]
    fn few_symbols_are_sorted_and_pipe_joined() {
        let symbols = vec!["MSFT".to_string(), "AAPL".to_string()];
        let key = build_unified_cache_key("quotes", &symbols, None).unwrap();
        assert_eq!(key.as_str(), "quotes:AAPL|MSFT");
    }

    #[test]
    fn many_symbols_hash_deterministically() {
        let symbols: Vec<String> =
            ["AAPL", "MSFT", "GOOG", "AMZN", "META", "NFLX"].iter().map(|s| s.to_string()).collect();
        let a = build_unified_cache_key("quotes", &symbols, None).unwrap();
        let mut shuffled = symbols.clone();
        shuffled.reverse();
        let b = build_unified_cache_key("quotes", &shuffled, None).unwrap();
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("quotes:hash:"));
        assert_eq!(a.as_str().len(), "quotes:hash:".len() + 16);
    }

    #[test]
    fn params_are_sorted_and_appended() {
        let key = build_unified_cache_key(
            "quotes",
            &["AAPL".to_string()],
            Some(&[("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())]),
        )
        .unwrap();
        assert_eq!(key.as_str(), "quotes:AAPL:a:1|b:2");
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert_eq!(build_unified_cache_key("", &["AAPL".to_string()], None), Err(KeyBuilderError::EmptyPrefix));
    }

    #[test]
    fn empty_symbols_are_rejected() {
        assert_eq!(build_unified_cache_key("quotes", &[], None), Err(KeyBuilderError::EmptySymbols));
    }
}
