use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::ons::endpoints::classify;
use crate::ons::{FetchError, PayloadSource};
use crate::registry::{RegistryEvent, SeriesRegistry, TotalPolicy};
use crate::series::SeriesTag;
use crate::series::builder::{BuildNotice, SeriesBuilder};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

/// User-visible condition attached to a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    NoData(String),
    FormatError(String),
    RateLimited(String),
    NotFound(String),
    Transport(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::NoData(m)
            | Notice::FormatError(m)
            | Notice::RateLimited(m)
            | Notice::NotFound(m)
            | Notice::Transport(m) => m,
        }
    }
}

impl From<&BuildNotice> for Notice {
    fn from(notice: &BuildNotice) -> Self {
        match notice {
            BuildNotice::NoData => Notice::NoData(notice.to_string()),
            BuildNotice::InvalidPayload | BuildNotice::Inference(_) => {
                Notice::FormatError(notice.to_string())
            }
        }
    }
}

impl From<&FetchError> for Notice {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::RateLimited => Notice::RateLimited(
                "The ONS API request quota was exceeded and no cached data is available. \
                 Wait a few minutes and select the series again."
                    .to_string(),
            ),
            FetchError::NotFound(endpoint) => {
                Notice::NotFound(format!("Endpoint {} is not available", endpoint))
            }
            other => Notice::Transport(format!("Failed to load data: {}", other)),
        }
    }
}

/// What happened when a fetched payload was handed to the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Landing {
    pub events: Vec<RegistryEvent>,
    pub notice: Option<Notice>,
    pub skipped: usize,
    /// False when the endpoint was deselected while its fetch was in flight
    pub materialized: bool,
}

/// Owns the cache, the registry and the current selection
#[derive(Debug)]
pub struct Dashboard {
    cache: ResponseCache,
    registry: SeriesRegistry,
    builder: SeriesBuilder,
    selected: BTreeSet<String>,
}

impl Dashboard {
    pub fn new(cache: ResponseCache, offset: FixedOffset) -> Self {
        Self {
            cache,
            registry: SeriesRegistry::new(),
            builder: SeriesBuilder::new(offset),
            selected: BTreeSet::new(),
        }
    }

    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn is_selected(&self, endpoint: &str) -> bool {
        self.selected.contains(endpoint)
    }

    /// Mark an endpoint as selected, before its data is fetched
    pub fn select(&mut self, endpoint: &str) -> Result<(), DashboardError> {
        classify(endpoint).ok_or_else(|| DashboardError::UnknownEndpoint(endpoint.to_string()))?;
        self.selected.insert(endpoint.to_string());
        Ok(())
    }

    /// Unselect an endpoint and drop its series
    pub fn deselect(&mut self, endpoint: &str) -> Vec<RegistryEvent> {
        if !self.selected.remove(endpoint) {
            return Vec::new();
        }

        let Some((grouping, tag)) = classify(endpoint) else {
            return Vec::new();
        };

        if tag != SeriesTag::Total {
            return self.registry.remove(&grouping, tag);
        }

        // Until the reported total lands, "Total" is still the derived one
        let reported = self
            .registry
            .grouping(&grouping)
            .is_some_and(|g| g.policy() == TotalPolicy::Reported);
        if !reported {
            return Vec::new();
        }

        let mut events = self.registry.remove(&grouping, tag);
        events.extend(self.registry.set_policy(&grouping, TotalPolicy::Derived));
        events
    }

    /// Cached payload still within its freshness window
    pub fn fresh_payload(&self, endpoint: &str, now: DateTime<Utc>) -> Option<Vec<Value>> {
        self.cache.fresh(endpoint, now).map(<[Value]>::to_vec)
    }

    /// Record a network outcome in the cache, with the stale fallback on rate limits
    pub fn settle_fetch(
        &mut self,
        endpoint: &str,
        outcome: Result<Vec<Value>, FetchError>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Value>, FetchError> {
        self.cache.resolve(endpoint, outcome, now)
    }

    /// Turn a payload into a series and place it, unless the endpoint was
    /// deselected in the meantime.
    pub fn land(&mut self, endpoint: &str, payload: Vec<Value>) -> Landing {
        if !self.is_selected(endpoint) {
            info!("{} was deselected before its data arrived, discarding", endpoint);
            return Landing::default();
        }

        let Some((grouping, tag)) = classify(endpoint) else {
            return Landing::default();
        };

        let outcome = self.builder.build(&Value::Array(payload));
        let notice = outcome.notice.as_ref().map(Notice::from);
        if let Some(notice) = &notice {
            warn!("{}: {}", endpoint, notice.message());
        }

        let mut events = Vec::new();
        if tag == SeriesTag::Total {
            events.extend(self.registry.set_policy(&grouping, TotalPolicy::Reported));
        }
        events.extend(self.registry.upsert(&grouping, tag, outcome.points));

        Landing {
            events,
            notice,
            skipped: outcome.skipped,
            materialized: true,
        }
    }

    /// Select an endpoint and load it through the cache
    pub async fn toggle_on<S: PayloadSource>(
        &mut self,
        source: &S,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> Result<Landing, DashboardError> {
        self.select(endpoint)?;

        match self.cache.fetch_through(source, endpoint, now).await {
            Ok(payload) => Ok(self.land(endpoint, payload)),
            Err(e) => {
                warn!("fetching {} failed: {}", endpoint, e);
                Ok(Landing {
                    notice: Some(Notice::from(&e)),
                    ..Landing::default()
                })
            }
        }
    }

    /// Forget everything, e.g. when switching to another system
    pub fn reset(&mut self) -> Vec<RegistryEvent> {
        self.selected.clear();
        self.cache.clear();
        self.registry.clear()
    }
}
