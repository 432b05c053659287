//! Local reactive storage for synced data.
//!
//! A `LocalStore` persists the latest value per key, tracks whether that value
//! is still valid, and exposes a reactive `read` stream that emits the stored
//! value and then every later write. Validity is decided by a pluggable
//! `FreshnessPolicy`.
//!
//! Two implementations are provided:
//! - `MemoryStore`: process-local, nothing survives a restart
//! - `JsonFileStore`: one JSON file per key under a cache directory

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Outcome;

/// Consider data stale one hour after it was last validated.
/// Menus change at most a few times a day, so an hour keeps requests rare.
pub const DEFAULT_STALE_MINUTES: i64 = 60;

/// Storage contract the sync engine depends on.
///
/// Writes and validity are separate: a write replaces the data and clears
/// validity, `mark_valid` records that the data is complete and fresh.
/// A store is not required to roll back a write whose producer was later
/// cancelled; callers check cancellation before writing instead.
pub trait LocalStore<P, T>: Send + Sync + 'static {
    fn write(&self, param: &P, value: T) -> impl Future<Output = Outcome<()>> + Send;

    fn mark_valid(&self, param: &P) -> impl Future<Output = Outcome<()>> + Send;

    fn is_valid(&self, param: &P) -> impl Future<Output = Outcome<bool>> + Send;

    /// Stored value right now, without following later writes.
    fn current(&self, param: &P) -> impl Future<Output = Outcome<Option<T>>> + Send;

    /// Stream of the stored value: the current one (if any), then one item per write.
    fn read(&self, param: &P) -> BoxStream<'static, Outcome<T>>;
}

/// Stable, file-name safe identifier for a key.
pub trait CacheKey {
    fn cache_name(&self) -> String;
}

/// Decides whether data validated at some instant may still be served.
pub trait FreshnessPolicy: Send + Sync {
    fn is_fresh(&self, validated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool;
}

/// Fresh for a fixed duration after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge(pub Duration);

impl MaxAge {
    pub fn minutes(minutes: i64) -> Self {
        Self(Duration::minutes(minutes))
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        Self::minutes(DEFAULT_STALE_MINUTES)
    }
}

impl FreshnessPolicy for MaxAge {
    fn is_fresh(&self, validated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - validated_at <= self.0
    }
}

/// Never fresh: every sync contacts the remote source.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysStale;

impl FreshnessPolicy for AlwaysStale {
    fn is_fresh(&self, _validated_at: DateTime<Utc>, _now: DateTime<Utc>) -> bool {
        false
    }
}

/// Stored value together with when it was written and last validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            validated_at: None,
        }
    }

    pub fn is_valid(&self, policy: &dyn FreshnessPolicy, now: DateTime<Utc>) -> bool {
        self.validated_at
            .map(|at| policy.is_fresh(at, now))
            .unwrap_or(false)
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Turn a watch slot into a store read stream.
///
/// With `emit_current` the slot's present value (if any) is emitted first;
/// afterwards every change is emitted. Rapid successive writes may coalesce
/// into the latest one.
pub(crate) fn watch_stream<T>(
    rx: watch::Receiver<Option<T>>,
    emit_current: bool,
) -> BoxStream<'static, Outcome<T>>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, emit_current), |(mut rx, mut pending)| async move {
        loop {
            if !pending && rx.changed().await.is_err() {
                return None;
            }
            pending = false;
            let current = rx.borrow_and_update().clone();
            if let Some(value) = current {
                return Some((Ok(value), (rx, false)));
            }
        }
    })
    .boxed()
}
