//! Concrete scenarios 5 and 6 (spec §8) for the cache key builder.

use smart_cache_ttl::key::build_unified_cache_key;

#[test]
fn key_builder_is_order_independent_for_two_symbols() {
    let a = build_unified_cache_key("q", &["B".to_string(), "A".to_string()], Some(&[("provider".to_string(), "x".to_string())])).unwrap();
    let b = build_unified_cache_key("q", &["A".to_string(), "B".to_string()], Some(&[("provider".to_string(), "x".to_string())])).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "q:A|B:provider:x");
}

#[test]
fn large_symbol_set_hashes_to_the_expected_digest() {
    let symbols: Vec<String> = ["A", "B", "C", "D", "E", "F"].iter().map(|s| s.to_string()).collect();
    let key = build_unified_cache_key("q", &symbols, None).unwrap();
    // sha1sum <<< "A|B|C|D|E|F" -> 8ed14c9efb7070d42368688ab7a11030b8871856
    assert_eq!(key.as_str(), "q:hash:8ed14c9efb7070d4");
}
