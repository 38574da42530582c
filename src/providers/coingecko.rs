use crate::core::market::{FetchError, Instrument, MarketDataProvider, MarketQuery};
use crate::core::overview::{MarketOverview, OverviewProvider};
use crate::providers::util::with_retry;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// CoinGecko-compatible market data source. Implements both the instrument
/// list and the global overview endpoints.
pub struct CoinGeckoProvider {
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        CoinGeckoProvider {
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, FetchError>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!("Requesting market data from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("cryptodash/0.2")
            .build()?;
        let mut request = client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Deserialize)]
struct MarketsItem {
    symbol: String,
    name: String,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    price_change_percentage_24h: Option<f64>,
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    #[instrument(
        name = "CoinGeckoMarkets",
        skip(self),
        fields(query = %query)
    )]
    async fn fetch_instruments(
        &self,
        query: &MarketQuery,
    ) -> Result<Vec<Instrument>, FetchError> {
        let url = format!(
            "{}/coins/markets?vs_currency=usd&order=market_cap_desc&per_page={}&page=1",
            self.base_url,
            query.limit()
        );
        let items: Vec<MarketsItem> = self.get_json(&url).await?;

        let mut instruments = Vec::with_capacity(items.len());
        for item in items {
            // Delisted or unpriced coins come back with a null price.
            let Some(price) = item.current_price.filter(|p| *p > 0.0) else {
                warn!("Dropping {}: no usable price", item.symbol);
                continue;
            };
            instruments.push(Instrument {
                symbol: item.symbol.to_uppercase(),
                name: item.name,
                price,
                change_24h: item.price_change_percentage_24h,
                volume: item.total_volume.unwrap_or_default(),
                market_cap: item.market_cap.unwrap_or_default(),
            });
        }

        debug!("Fetched {} instruments", instruments.len());
        Ok(instruments)
    }
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    total_market_cap: HashMap<String, f64>,
    total_volume: HashMap<String, f64>,
    market_cap_percentage: HashMap<String, f64>,
}

fn usd_of(values: &HashMap<String, f64>) -> f64 {
    values.get("usd").copied().unwrap_or_default()
}

#[async_trait]
impl OverviewProvider for CoinGeckoProvider {
    #[instrument(name = "CoinGeckoGlobal", skip(self))]
    async fn fetch_overview(&self) -> Result<MarketOverview, FetchError> {
        let url = format!("{}/global", self.base_url);
        let response: GlobalResponse = with_retry(|| self.get_json(&url), 2, 500).await?;

        let data = response.data;
        Ok(MarketOverview {
            total_market_cap: usd_of(&data.total_market_cap),
            total_volume_24h: usd_of(&data.total_volume),
            btc_dominance_pct: data
                .market_cap_percentage
                .get("btc")
                .copied()
                .unwrap_or_default(),
        })
    }
}
