//! Market Status Provider contract (G).
//!
//! Consumed interface only — the core never implements a real market
//! calendar. Callers inject an implementation (e.g. backed by an exchange
//! calendar service); tests use [`StaticMarketStatusProvider`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Discrete market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketState {
    /// Regular trading session.
    Trading,
    /// Pre-market session.
    PreMarket,
    /// Market closed, not a holiday.
    Closed,
    /// Market closed for a holiday.
    Holiday,
}

/// When the market will next change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStateChange {
    /// Timestamp of the next transition.
    pub at: DateTime<Utc>,
    /// State the market will be in after the transition.
    pub to: MarketState,
}

impl NextStateChange {
    /// Hours from `now` until this transition. Negative if already past.
    pub fn hours_away(&self, now: DateTime<Utc>) -> f64 {
        (self.at - now).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Current status of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    /// Whether the market is currently open for trading.
    pub is_open: bool,
    /// IANA timezone name for the market, e.g. `"America/New_York"`.
    pub timezone: &'static str,
    /// Current discrete state.
    pub status: MarketState,
    /// Next scheduled state transition, if known.
    pub next_state_change: Option<NextStateChange>,
}

impl MarketStatus {
    /// Whether this status represents a holiday closure.
    pub fn is_holiday(&self) -> bool {
        self.status == MarketState::Holiday
    }
}

/// Consumed interface for market-calendar lookups (§4.11).
///
/// Implementations must be safe for concurrent callers; the orchestrator
/// treats this as read-only and never caches results longer than
/// `nearRealTimeTtlSeconds`.
#[async_trait]
pub trait MarketStatusProvider: Send + Sync {
    /// Looks up the current status of `market_code` (e.g. `"NASDAQ"`, `"NYSE"`).
    async fn get_market_status(&self, market_code: &str) -> Result<MarketStatus, CacheError>;
}

/// Fixed-answer provider, useful for tests and for markets with no live feed.
#[derive(Debug, Clone)]
pub struct StaticMarketStatusProvider {
    status: MarketStatus,
}

impl StaticMarketStatusProvider {
    /// Always returns `status` regardless of `market_code`.
    pub fn new(status: MarketStatus) -> Self {
        Self { status }
    }
}

#[async_trait]
impl MarketStatusProvider for StaticMarketStatusProvider {
    async fn get_market_status(&self, _market_code: &str) -> Result<MarketStatus, CacheError> {
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_ignores_market_code() {
        let provider = StaticMarketStatusProvider::new(MarketStatus {
            is_open: true,
            timezone: "America/New_York",
            status: MarketState::Trading,
            next_state_change: None,
        });
        let a = provider.get_market_status("NASDAQ").await.unwrap();
        let b = provider.get_market_status("ANYTHING").await.unwrap();
        assert_eq!(a, b);
    }
}
