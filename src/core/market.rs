//! Market data abstractions and core types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

/// Identity of a market data request. Entries in the cache and in-flight
/// fetches are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketQuery {
    /// Top instruments by market capitalization.
    TopInstruments { limit: u32 },
}

impl MarketQuery {
    pub fn top(limit: u32) -> Self {
        MarketQuery::TopInstruments { limit }
    }

    pub fn limit(&self) -> u32 {
        match self {
            MarketQuery::TopInstruments { limit } => *limit,
        }
    }
}

impl Display for MarketQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketQuery::TopInstruments { limit } => write!(f, "top-instruments:{limit}"),
        }
    }
}

/// One row of market data. A fetch produces a fresh ordered list of these;
/// the order is the display ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    /// 24h change in percent. Absent when the source did not report one.
    pub change_24h: Option<f64>,
    pub volume: f64,
    pub market_cap: f64,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by the market data source")]
    RateLimited,
    #[error("market data source returned HTTP {status}")]
    Upstream { status: u16 },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed market data payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_instruments(&self, query: &MarketQuery)
    -> Result<Vec<Instrument>, FetchError>;
}
