//! Market data cache: the single source of truth for fetched instruments

use crate::core::market::{FetchError, Instrument, MarketQuery};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

/// Age limits for cached entries.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Maximum age served to a new subscriber without a fetch.
    pub staleness: Duration,
    /// How long an entry without subscribers stays cached.
    pub eviction: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(300),
            eviction: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Handle for one fetch attempt cycle. Results are applied against the
/// ticket so superseded fetches can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub query: MarketQuery,
    pub generation: u64,
}

/// Point-in-time view of a cache entry, safe to hold across renders.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub query: MarketQuery,
    pub data: Option<Vec<Instrument>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age: Option<Duration>,
    pub status: FetchStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// Result of `subscribe`: the current entry plus whether the caller should
/// request a fetch for it.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub snapshot: EntrySnapshot,
    pub needs_fetch: bool,
}

struct EntryState {
    data: Option<Vec<Instrument>>,
    fetched_at: Option<DateTime<Utc>>,
    fetched_instant: Option<Instant>,
    status: FetchStatus,
    retry_count: u32,
    last_error: Option<String>,
    subscribers: usize,
    idle_since: Option<Instant>,
    invalidated: bool,
    next_generation: u64,
    applied_generation: u64,
    in_flight: Option<u64>,
}

impl EntryState {
    fn new() -> Self {
        Self {
            data: None,
            fetched_at: None,
            fetched_instant: None,
            status: FetchStatus::Idle,
            retry_count: 0,
            last_error: None,
            subscribers: 0,
            idle_since: None,
            invalidated: false,
            next_generation: 1,
            applied_generation: 0,
            in_flight: None,
        }
    }

    fn age(&self) -> Option<Duration> {
        self.fetched_instant.map(|at| at.elapsed())
    }

    fn snapshot(&self, query: MarketQuery) -> EntrySnapshot {
        EntrySnapshot {
            query,
            data: self.data.clone(),
            fetched_at: self.fetched_at,
            age: self.age(),
            status: self.status,
            retry_count: self.retry_count,
            last_error: self.last_error.clone(),
        }
    }

    /// Status shown once nothing is in flight anymore.
    fn settle_status(&mut self) {
        self.status = if self.data.is_some() {
            FetchStatus::Success
        } else {
            FetchStatus::Idle
        };
    }
}

pub struct MarketCache {
    entries: Mutex<HashMap<MarketQuery, EntryState>>,
    policy: CachePolicy,
    revision: watch::Sender<u64>,
}

impl MarketCache {
    pub fn new(policy: CachePolicy) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
            revision,
        }
    }

    /// Receiver that changes whenever visible entry state changes. Used by
    /// the dashboard to re-render exactly when something happened.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Registers interest in a query and returns the current entry. The
    /// caller requests a fetch when `needs_fetch` is set: first subscriber,
    /// entry older than the staleness threshold, or invalidated.
    pub async fn subscribe(&self, query: MarketQuery) -> Subscription {
        let mut entries = self.entries.lock().await;
        Self::evict_expired(&mut entries, self.policy.eviction);

        let entry = entries.entry(query).or_insert_with(EntryState::new);
        entry.subscribers += 1;
        entry.idle_since = None;

        let stale = entry.age().is_some_and(|age| age > self.policy.staleness);
        let needs_fetch = entry.invalidated || entry.data.is_none() || stale;

        if entry.data.is_none() {
            debug!("Cache MISS for {query}");
        } else if stale {
            debug!("Cache STALE for {query}");
        } else {
            debug!("Cache HIT for {query}");
        }

        Subscription {
            snapshot: entry.snapshot(query),
            needs_fetch,
        }
    }

    /// Drops one registration of interest and returns how many remain. The
    /// entry stays cached for the eviction window once nobody is subscribed.
    pub async fn unsubscribe(&self, query: MarketQuery) -> usize {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&query) else {
            return 0;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            entry.idle_since = Some(Instant::now());
            // Release the in-flight marker: the running cycle observes it
            // via `cycle_active` and stops retrying, and a later mount can
            // start a new fetch. An orphaned result is dropped by the
            // subscriber and generation guards in `apply`.
            entry.in_flight = None;
            entry.settle_status();
            debug!("No subscribers left for {query}");
        }
        entry.subscribers
    }

    /// Marks the entry so the next access re-fetches regardless of age.
    pub async fn invalidate(&self, query: MarketQuery) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&query) {
            entry.invalidated = true;
            debug!("Invalidated {query}");
        }
    }

    /// Starts a fetch cycle unless one is already in flight for the query.
    /// Returns the ticket to apply results against, or `None` when the call
    /// joined an existing fetch.
    pub async fn begin_fetch(&self, query: MarketQuery) -> Option<FetchTicket> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&query) else {
            warn!("Fetch requested for unknown entry {query}");
            return None;
        };
        if entry.subscribers == 0 {
            debug!("Skipping fetch for {query}: no subscribers");
            return None;
        }
        if entry.in_flight.is_some() {
            debug!("Fetch already in flight for {query}");
            return None;
        }

        let generation = entry.next_generation;
        entry.next_generation += 1;
        entry.in_flight = Some(generation);
        entry.invalidated = false;
        entry.status = FetchStatus::Loading;
        drop(entries);

        self.bump();
        Some(FetchTicket { query, generation })
    }

    /// Whether a fetch cycle still owns its entry's in-flight slot. The
    /// slot is released when the last subscriber leaves, which cancels the
    /// cycle's pending retries.
    pub async fn cycle_active(&self, ticket: FetchTicket) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(&ticket.query)
            .is_some_and(|entry| entry.in_flight == Some(ticket.generation))
    }

    /// Records one failed attempt inside a fetch cycle. The entry keeps
    /// loading; `attempt` becomes the visible retry count.
    pub async fn record_failure(&self, query: MarketQuery, attempt: u32, error: &FetchError) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&query) {
            entry.retry_count = attempt;
            entry.last_error = Some(error.to_string());
            drop(entries);
            self.bump();
        }
    }

    /// Applies the outcome of a fetch cycle. Returns whether the entry was
    /// updated; results from superseded generations and results arriving
    /// with no subscribers left are discarded.
    pub async fn apply(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<Instrument>, FetchError>,
    ) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&ticket.query) else {
            debug!("Discarding fetch result for evicted entry {}", ticket.query);
            return false;
        };

        if entry.in_flight == Some(ticket.generation) {
            entry.in_flight = None;
        }

        if ticket.generation <= entry.applied_generation {
            debug!(
                "Discarding stale generation {} for {} (applied: {})",
                ticket.generation, ticket.query, entry.applied_generation
            );
            return false;
        }
        if entry.subscribers == 0 {
            entry.settle_status();
            debug!("Discarding fetch result for {}: no subscribers", ticket.query);
            return false;
        }

        entry.applied_generation = ticket.generation;
        match result {
            Ok(data) => {
                debug!("Cache PUT for {} ({} records)", ticket.query, data.len());
                entry.data = Some(data);
                entry.fetched_at = Some(Utc::now());
                entry.fetched_instant = Some(Instant::now());
                entry.status = FetchStatus::Success;
                entry.retry_count = 0;
                entry.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "Fetch failed for {}", ticket.query);
                entry.status = FetchStatus::Error;
                entry.last_error = Some(e.to_string());
            }
        }
        drop(entries);

        self.bump();
        true
    }

    /// Cancels a fetch cycle without an outcome, e.g. when shutdown
    /// interrupts a retry backoff.
    pub async fn abandon(&self, ticket: FetchTicket) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&ticket.query)
            && entry.in_flight == Some(ticket.generation)
        {
            entry.in_flight = None;
            entry.settle_status();
            debug!("Abandoned fetch for {}", ticket.query);
            drop(entries);
            self.bump();
        }
    }

    /// Read-only view of an entry, if present.
    pub async fn peek(&self, query: MarketQuery) -> Option<EntrySnapshot> {
        let entries = self.entries.lock().await;
        entries.get(&query).map(|entry| entry.snapshot(query))
    }

    /// Drops entries whose eviction window elapsed with no subscribers.
    pub async fn purge_idle(&self) {
        let mut entries = self.entries.lock().await;
        Self::evict_expired(&mut entries, self.policy.eviction);
    }

    fn evict_expired(entries: &mut HashMap<MarketQuery, EntryState>, window: Duration) {
        entries.retain(|query, entry| {
            let expired = entry.subscribers == 0
                && entry
                    .idle_since
                    .is_some_and(|since| since.elapsed() > window);
            if expired {
                debug!("Evicting {query} after idle window");
            }
            !expired
        });
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    #[cfg(test)]
    pub(crate) async fn seed(&self, query: MarketQuery, data: Vec<Instrument>, age: Duration) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(query).or_insert_with(EntryState::new);
        entry.data = Some(data);
        entry.fetched_at = Some(Utc::now() - chrono::Duration::from_std(age).unwrap());
        entry.fetched_instant = Some(Instant::now() - age);
        entry.status = FetchStatus::Success;
        entry.applied_generation = entry.next_generation;
        entry.next_generation += 1;
    }
}
