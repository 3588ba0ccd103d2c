//! Insight logging: first-occurrence flags plus diagnostic records.
//!
//! A flag holds the time (seconds since epoch) an event first happened.
//! Writing is at-most-once per key for as long as the flag exists; repeats
//! only produce diagnostics.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    client::ClientContext,
    clock::Clock,
    keys::{InsightEvent, StorageKeyMap},
    store::FlagStore,
};

/// Daily events are re-recorded once their flag is older than this.
pub const DAILY_EVENT_SECONDS: f64 = 24.0 * 60.0 * 60.0;

/// What a record call did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// A new flag was written with this timestamp.
    Written(f64),
    /// A stale daily flag was replaced with this timestamp.
    Refreshed(f64),
    /// The flag already existed; nothing was written. Carries the browser
    /// context that was logged when the repeat was a conversion.
    AlreadyPresent(Option<RepeatReport>),
}

/// Second record emitted when a conversion event repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatReport {
    pub key: String,
    pub referrer: String,
    pub url: String,
    pub user_agent: String,
}

/// Writes insight flags through a bound [`StorageKeyMap`].
#[derive(Clone)]
pub struct InsightLogger {
    store: Arc<dyn FlagStore>,
    keys: Arc<StorageKeyMap>,
    clock: Arc<dyn Clock>,
    client: Arc<ClientContext>,
}

impl InsightLogger {
    pub fn new(
        store: Arc<dyn FlagStore>,
        keys: Arc<StorageKeyMap>,
        clock: Arc<dyn Clock>,
        client: Arc<ClientContext>,
    ) -> Self {
        Self {
            store,
            keys,
            clock,
            client,
        }
    }

    #[must_use]
    pub fn keys(&self) -> &StorageKeyMap {
        &self.keys
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Raw stored value for `event`, if any.
    #[must_use]
    pub fn flag(&self, event: InsightEvent) -> Option<String> {
        self.store.get(self.keys.key_for(event))
    }

    #[must_use]
    pub fn has_flag(&self, event: InsightEvent) -> bool {
        self.flag(event).is_some()
    }

    /// Stored timestamp for `event`, in seconds.
    ///
    /// `Some(NaN)` for a flag that exists but does not parse, so comparisons
    /// against it are always false.
    #[must_use]
    pub fn flag_seconds(&self, event: InsightEvent) -> Option<f64> {
        let raw = self.flag(event)?;
        Some(parse_seconds(self.keys.key_for(event), &raw))
    }

    pub fn clear(&self, event: InsightEvent) {
        self.store.remove(self.keys.key_for(event));
    }

    /// Record that `event` happened.
    ///
    /// Writes the current time if no flag exists. Otherwise leaves the store
    /// alone; repeats of the three conversion events emit a second record
    /// with referrer, URL and user agent.
    pub fn record(&self, event: InsightEvent) -> Recorded {
        let key = self.keys.key_for(event);
        if self.store.get(key).is_none() {
            let now = self.clock.now_seconds();
            self.store.set(key, &now.to_string());
            info!(target: "nudge::insight", key, event = event.name(), "{key} tracked");
            return Recorded::Written(now);
        }

        if !event.is_conversion() {
            return Recorded::AlreadyPresent(None);
        }
        let report = RepeatReport {
            key: key.to_string(),
            referrer: self.client.referrer.clone(),
            url: self.client.url.clone(),
            user_agent: self.client.user_agent.clone(),
        };
        info!(
            target: "nudge::insight",
            name = %report.key,
            referrer = %report.referrer,
            url = %report.url,
            user_agent = %report.user_agent,
            "{key} tracked with browser info"
        );
        Recorded::AlreadyPresent(Some(report))
    }

    /// Record an event at most once per day: a flag older than
    /// [`DAILY_EVENT_SECONDS`] is dropped and written again.
    pub fn record_daily(&self, event: InsightEvent) -> Recorded {
        let Some(then) = self.flag_seconds(event) else {
            return self.record(event);
        };
        if self.clock.now_seconds() - then > DAILY_EVENT_SECONDS {
            self.clear(event);
            return match self.record(event) {
                Recorded::Written(at) => Recorded::Refreshed(at),
                other => other,
            };
        }
        Recorded::AlreadyPresent(None)
    }
}

fn parse_seconds(key: &str, raw: &str) -> f64 {
    raw.trim().parse().unwrap_or_else(|e| {
        warn!(key, value = raw, error = %e, "flag value is not a timestamp");
        f64::NAN
    })
}
