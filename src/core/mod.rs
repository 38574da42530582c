//! Core business logic abstractions

pub mod auth;
pub mod cache;
pub mod config;
pub mod format;
pub mod log;
pub mod market;
pub mod overview;
pub mod refresh;
pub mod router;
pub mod session;

// Re-export main types for cleaner imports
pub use cache::{CachePolicy, EntrySnapshot, FetchStatus, MarketCache};
pub use market::{FetchError, Instrument, MarketDataProvider, MarketQuery};
pub use refresh::{RefreshPolicy, RefreshScheduler};
pub use session::{SessionStore, SessionToken};
