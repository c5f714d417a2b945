//! TTL Calculator (H): pure `(dataType, market, freshness) -> TTL seconds` function (§4.7).

use smart_cache_core::config::Config;
use smart_cache_core::market::{MarketState, MarketStatus};

/// Caller-supplied overrides that replace (not multiply onto) a computed multiplier.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomMultipliers {
    /// Overrides the market-awareness multiplier.
    pub market: Option<f64>,
    /// Overrides the data-type multiplier.
    pub data_type: Option<f64>,
    /// Overrides the freshness multiplier.
    pub freshness: Option<f64>,
}

/// Inputs to [`calculate_optimal_ttl`].
#[derive(Debug, Clone)]
pub struct TtlContext<'a> {
    /// Symbol the TTL is being computed for (carried through for logging only).
    pub symbol: &'a str,
    /// Data type tag, e.g. `"stock-quote"`, `"historical"`, `"static"`.
    pub data_type: &'a str,
    /// Live market status, if known.
    pub market_status: Option<MarketStatus>,
    /// Freshness class, e.g. `"realtime"`, `"analytical"`, `"archive"`.
    pub freshness_requirement: Option<&'a str>,
    /// Per-call multiplier overrides.
    pub custom_multipliers: Option<CustomMultipliers>,
}

/// Output of [`calculate_optimal_ttl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlResult {
    /// Effective TTL in seconds, already clamped to `[minTtl, maxTtl]`.
    pub ttl: u32,
    /// Which branch of the algorithm determined this TTL.
    pub strategy: &'static str,
    /// Human-readable explanation, meant for logging.
    pub reasoning: String,
}

fn base_ttl_for_data_type(data_type: &str, default_ttl_seconds: u32) -> (u32, bool) {
    match data_type {
        "stock-quote" => (300, true),
        "historical" => (3_600, true),
        "static" => (86_400, true),
        _ => (default_ttl_seconds, false),
    }
}

fn freshness_multiplier(freshness: &str) -> f64 {
    match freshness {
        "realtime" => 0.3,
        "analytical" => 1.5,
        "archive" => 3.0,
        _ => 1.0,
    }
}

/// Computes the optimal TTL for `ctx` per the algorithm in §4.7.
pub fn calculate_optimal_ttl(ctx: &TtlContext<'_>, config: &Config) -> TtlResult {
    let (base_ttl, mapped) = base_ttl_for_data_type(ctx.data_type, config.default_ttl_seconds);
    let mut strategy: &'static str = if mapped { "data_type_based" } else { "default_fallback" };

    let mut market_mul = 1.0f64;
    let mut market_note = String::new();
    if let Some(status) = ctx.market_status {
        strategy = "market_aware";
        if status.is_open {
            market_mul = 0.5;
            market_note = "market open, shortening TTL".to_string();
        } else {
            market_mul = 2.0;
            market_note = "market closed, extending TTL".to_string();
            if let Some(next) = status.next_state_change {
                if next.hours_away(chrono::Utc::now()) > 8.0 {
                    market_mul = (market_mul * 2.0).min(4.0);
                    market_note.push_str("; next open >8h away, extending further");
                }
            }
        }
        if status.status == MarketState::Holiday {
            market_note.push_str("; holiday");
        }
    }

    let mut freshness_mul = 1.0f64;
    let mut freshness_note = String::new();
    if let Some(freshness) = ctx.freshness_requirement {
        freshness_mul = freshness_multiplier(freshness);
        if strategy != "default_fallback" {
            strategy = "freshness_optimized";
        }
        freshness_note = format!("freshness '{freshness}' applied multiplier {freshness_mul}");
    }

    let mut data_type_mul = 1.0f64;
    if let Some(overrides) = ctx.custom_multipliers {
        if let Some(m) = overrides.market {
            market_mul = m;
        }
        if let Some(d) = overrides.data_type {
            data_type_mul = d;
        }
        if let Some(f) = overrides.freshness {
            freshness_mul = f;
        }
    }

    let raw_ttl = (base_ttl as f64 * market_mul * data_type_mul * freshness_mul).round();
    let ttl = config.clamp_ttl(raw_ttl.max(0.0) as u32);

    let reasoning = format!(
        "symbol={} data_type={} base_ttl={base_ttl}s strategy={strategy} market_mul={market_mul} data_type_mul={data_type_mul} freshness_mul={freshness_mul} -> {ttl}s{}{}",
        ctx.symbol,
        ctx.data_type,
        if market_note.is_empty() { String::new() } else { format!("; {market_note}") },
        if freshness_note.is_empty() { String::new() } else { format!("; {freshness_note}") },
    );

    TtlResult { ttl, strategy, reasoning }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_cache_core::market::NextStateChange;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn known_data_type_maps_to_its_base_ttl() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "stock-quote",
            market_status: None,
            freshness_requirement: None,
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.ttl, 300);
        assert_eq!(result.strategy, "data_type_based");
    }

    #[test]
    fn unknown_data_type_falls_back_to_configured_default() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "exotic",
            market_status: None,
            freshness_requirement: None,
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.ttl, config().default_ttl_seconds);
        assert_eq!(result.strategy, "default_fallback");
    }

    #[test]
    fn open_market_halves_ttl_and_sets_market_aware_strategy() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "stock-quote",
            market_status: Some(MarketStatus {
                is_open: true,
                timezone: "America/New_York",
                status: MarketState::Trading,
                next_state_change: None,
            }),
            freshness_requirement: None,
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.ttl, 150);
        assert_eq!(result.strategy, "market_aware");
    }

    #[test]
    fn closed_market_far_from_reopen_quadruples_base() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "stock-quote",
            market_status: Some(MarketStatus {
                is_open: false,
                timezone: "America/New_York",
                status: MarketState::Closed,
                next_state_change: Some(NextStateChange {
                    at: chrono::Utc::now() + chrono::Duration::hours(12),
                    to: MarketState::Trading,
                }),
            }),
            freshness_requirement: None,
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.ttl, 1_200);
    }

    #[test]
    fn freshness_overrides_strategy_label_when_not_default_fallback() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "stock-quote",
            market_status: None,
            freshness_requirement: Some("realtime"),
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.strategy, "freshness_optimized");
        assert_eq!(result.ttl, 90);
    }

    #[test]
    fn freshness_does_not_override_default_fallback_strategy() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "exotic",
            market_status: None,
            freshness_requirement: Some("realtime"),
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.strategy, "default_fallback");
    }

    #[test]
    fn custom_multiplier_overrides_rather_than_multiplies() {
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "stock-quote",
            market_status: None,
            freshness_requirement: None,
            custom_multipliers: Some(CustomMultipliers { market: Some(3.0), data_type: None, freshness: None }),
        };
        let result = calculate_optimal_ttl(&ctx, &config());
        assert_eq!(result.ttl, 900);
    }

    #[test]
    fn result_is_clamped_to_configured_bounds() {
        let mut cfg = config();
        cfg.max_ttl_seconds = 100;
        let ctx = TtlContext {
            symbol: "AAPL",
            data_type: "static",
            market_status: None,
            freshness_requirement: None,
            custom_multipliers: None,
        };
        let result = calculate_optimal_ttl(&ctx, &cfg);
        assert_eq!(result.ttl, 100);
    }
}
