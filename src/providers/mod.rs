pub mod auth_api;
pub mod coingecko;
pub mod util;

pub use auth_api::HttpCredentialValidator;
pub use coingecko::CoinGeckoProvider;
