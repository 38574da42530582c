//! Global market overview abstractions

use crate::core::market::FetchError;
use async_trait::async_trait;

/// Aggregate market stats shown in the dashboard banner.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOverview {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub btc_dominance_pct: f64,
}

impl MarketOverview {
    /// Share of the market outside BTC, clamped to 0..=100.
    pub fn alt_season_index(&self) -> f64 {
        (100.0 - self.btc_dominance_pct).clamp(0.0, 100.0)
    }
}

#[async_trait]
pub trait OverviewProvider: Send + Sync {
    async fn fetch_overview(&self) -> Result<MarketOverview, FetchError>;
}
