use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::ons::{FetchError, PayloadSource};

/// Seconds a fetched payload is served without going back to the network
pub const CACHE_DURATION_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fetched_at: DateTime<Utc>,
    pub payload: Vec<Value>,
}

/// Short-lived store of raw payloads per endpoint identifier.
///
/// Entries are only ever overwritten, never evicted: the key space is the
/// fixed set of known endpoints.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::seconds(CACHE_DURATION_SECS))
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Payload of an entry regardless of its age
    pub fn get(&self, key: &str) -> Option<&[Value]> {
        self.entries.get(key).map(|e| e.payload.as_slice())
    }

    pub fn put(&mut self, key: &str, payload: Vec<Value>, now: DateTime<Utc>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                fetched_at: now,
                payload,
            },
        );
    }

    pub fn is_fresh(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| now - e.fetched_at < self.ttl)
    }

    /// Payload of an entry only while it is fresh
    pub fn fresh(&self, key: &str, now: DateTime<Utc>) -> Option<&[Value]> {
        if self.is_fresh(key, now) {
            self.get(key)
        } else {
            None
        }
    }

    /// Apply the outcome of a network fetch.
    ///
    /// Success overwrites the entry. A rate-limited failure falls back to the
    /// existing entry however old it is. Any other failure leaves the entry
    /// untouched and is returned.
    pub fn resolve(
        &mut self,
        key: &str,
        outcome: Result<Vec<Value>, FetchError>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Value>, FetchError> {
        match outcome {
            Ok(payload) => {
                self.put(key, payload.clone(), now);
                debug!("cached {}, {} entries held", key, self.len());
                Ok(payload)
            }
            Err(e) if e.is_rate_limited() => match self.get(key) {
                Some(stale) => {
                    warn!("{} rate limited, serving cached payload", key);
                    Ok(stale.to_vec())
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Fetch through the cache: the network is only hit when the entry is stale
    pub async fn fetch_through<S: PayloadSource>(
        &mut self,
        source: &S,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Value>, FetchError> {
        if let Some(payload) = self.fresh(key, now) {
            debug!("cache hit for {}", key);
            return Ok(payload.to_vec());
        }

        info!("cache miss for {}, fetching", key);
        let outcome = source.fetch(key).await;
        self.resolve(key, outcome, now)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
