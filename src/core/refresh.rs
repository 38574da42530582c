//! Timed and manual refresh of cached market data

use crate::core::cache::{EntrySnapshot, MarketCache};
use crate::core::market::{FetchError, MarketDataProvider, MarketQuery};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Cadence and retry knobs for background refresh.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    /// Delay between periodic refreshes of a mounted query.
    pub interval: Duration,
    /// Attempts per fetch cycle before the error is surfaced.
    pub retry_limit: u32,
    /// Delay between attempts within a cycle.
    pub retry_delay: Duration,
    /// Added to the backoff when the source rate-limits us.
    pub rate_limit_penalty: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            retry_limit: 3,
            retry_delay: Duration::from_secs(1),
            rate_limit_penalty: Duration::from_secs(10),
        }
    }
}

impl RefreshPolicy {
    /// Delay before the next attempt after a failed one.
    pub fn backoff_after(&self, error: &FetchError) -> Duration {
        if error.is_rate_limited() {
            self.retry_delay + self.rate_limit_penalty
        } else {
            self.retry_delay
        }
    }
}

/// One fetch cycle: attempts with backoff until success, exhaustion,
/// shutdown or the last subscriber leaving. Joins an already running cycle
/// silently (`begin_fetch` dedups).
async fn run_cycle(
    cache: &MarketCache,
    provider: &dyn MarketDataProvider,
    policy: RefreshPolicy,
    query: MarketQuery,
    shutdown: &mut watch::Receiver<bool>,
) {
    let Some(ticket) = cache.begin_fetch(query).await else {
        return;
    };

    let mut attempt = 0;
    loop {
        match provider.fetch_instruments(&query).await {
            Ok(data) => {
                if *shutdown.borrow() {
                    cache.abandon(ticket).await;
                } else {
                    cache.apply(ticket, Ok(data)).await;
                }
                return;
            }
            Err(error) => {
                attempt += 1;
                cache.record_failure(query, attempt, &error).await;
                if attempt >= policy.retry_limit {
                    if *shutdown.borrow() {
                        cache.abandon(ticket).await;
                    } else {
                        cache.apply(ticket, Err(error)).await;
                    }
                    return;
                }

                let delay = policy.backoff_after(&error);
                debug!(
                    "Attempt {attempt}/{} failed for {query}: {error}. Retrying in {delay:?}",
                    policy.retry_limit
                );
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown.changed() => {}
                }
                if *shutdown.borrow() {
                    cache.abandon(ticket).await;
                    return;
                }
                if !cache.cycle_active(ticket).await {
                    debug!("Dropping retries for {query}: no subscribers left");
                    return;
                }
            }
        }
    }
}

/// Periodic refresh task for one mounted query.
struct QueryTimer {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

/// Drives periodic and on-demand refresh for mounted queries. Constructed
/// per dashboard session and torn down with `stop`.
pub struct RefreshScheduler {
    cache: Arc<MarketCache>,
    provider: Arc<dyn MarketDataProvider>,
    policy: RefreshPolicy,
    shutdown: watch::Sender<bool>,
    timers: Mutex<HashMap<MarketQuery, QueryTimer>>,
}

impl RefreshScheduler {
    pub fn new(
        cache: Arc<MarketCache>,
        provider: Arc<dyn MarketDataProvider>,
        policy: RefreshPolicy,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            cache,
            provider,
            policy,
            shutdown,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to a query, fetches if the cache says so, and arms the
    /// periodic timer. Returns the current entry for the first paint.
    pub async fn mount(&self, query: MarketQuery) -> EntrySnapshot {
        let sub = self.cache.subscribe(query).await;
        if sub.needs_fetch {
            self.spawn_cycle(query);
        }
        self.arm_timer(query).await;
        sub.snapshot
    }

    /// Drops interest in a query. The last subscriber leaving cancels the
    /// periodic timer and stops any pending retry at its next checkpoint.
    pub async fn unmount(&self, query: MarketQuery) {
        if self.cache.unsubscribe(query).await > 0 {
            return;
        }
        let mut timers = self.timers.lock().await;
        if let Some(timer) = timers.remove(&query) {
            timer.cancel.send_replace(true);
            // Not awaited: a timer mid-cycle exits at its next checkpoint.
            debug!("Refresh timer cancelled for {query}");
        }
    }

    /// Requests an immediate fetch, bypassing staleness. Joins an
    /// in-flight cycle instead of duplicating it.
    pub fn refresh_now(&self, query: MarketQuery) {
        debug!("Manual refresh requested for {query}");
        self.spawn_cycle(query);
    }

    /// Signals shutdown and waits for the periodic timers to wind down.
    /// Running cycles abandon their work at the next checkpoint.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let mut timers = self.timers.lock().await;
        for (query, timer) in timers.drain() {
            if timer.handle.await.is_err() {
                warn!("Refresh timer for {query} panicked");
            }
        }
        debug!("Refresh scheduler stopped");
    }

    fn spawn_cycle(&self, query: MarketQuery) {
        let cache = Arc::clone(&self.cache);
        let provider = Arc::clone(&self.provider);
        let policy = self.policy;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            run_cycle(&cache, provider.as_ref(), policy, query, &mut shutdown).await;
        });
    }

    async fn arm_timer(&self, query: MarketQuery) {
        if *self.shutdown.borrow() {
            return;
        }
        let mut timers = self.timers.lock().await;
        if timers.contains_key(&query) {
            return;
        }

        let cache = Arc::clone(&self.cache);
        let provider = Arc::clone(&self.provider);
        let policy = self.policy;
        let mut shutdown = self.shutdown.subscribe();
        let (cancel, mut cancelled) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(policy.interval) => {}
                    _ = shutdown.changed() => {}
                    _ = cancelled.changed() => {}
                }
                if *shutdown.borrow() || *cancelled.borrow() {
                    break;
                }

                cache.purge_idle().await;
                debug!("Periodic refresh for {query}");
                run_cycle(&cache, provider.as_ref(), policy, query, &mut shutdown).await;

                // Consulted again before re-arming the next tick.
                if *shutdown.borrow() || *cancelled.borrow() {
                    break;
                }
            }
            debug!("Refresh timer stopped for {query}");
        });
        timers.insert(query, QueryTimer { handle, cancel });
    }
}
