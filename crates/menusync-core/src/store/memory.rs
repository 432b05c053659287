use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use tokio::sync::watch;

use super::{watch_stream, FreshnessPolicy, LocalStore, MaxAge};
use crate::error::{ErrorKind, Outcome};

struct Slot<T> {
    tx: watch::Sender<Option<T>>,
    validated_at: Option<DateTime<Utc>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            validated_at: None,
        }
    }
}

/// Process-local store keeping one watch slot per key.
pub struct MemoryStore<P, T> {
    slots: Mutex<HashMap<P, Slot<T>>>,
    freshness: Arc<dyn FreshnessPolicy>,
}

impl<P, T> MemoryStore<P, T>
where
    P: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_freshness(Arc::new(MaxAge::default()))
    }

    pub fn with_freshness(freshness: Arc<dyn FreshnessPolicy>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            freshness,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<P, Slot<T>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored value, without subscribing.
    pub fn get(&self, param: &P) -> Option<T>
    where
        T: Clone,
    {
        self.slots()
            .get(param)
            .and_then(|slot| slot.tx.borrow().clone())
    }
}

impl<P, T> Default for MemoryStore<P, T>
where
    P: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, T> LocalStore<P, T> for MemoryStore<P, T>
where
    P: Clone + Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    async fn write(&self, param: &P, value: T) -> Outcome<()> {
        let mut slots = self.slots();
        let slot = slots.entry(param.clone()).or_insert_with(Slot::empty);
        slot.validated_at = None;
        slot.tx.send_replace(Some(value));
        Ok(())
    }

    async fn mark_valid(&self, param: &P) -> Outcome<()> {
        let mut slots = self.slots();
        match slots.get_mut(param) {
            Some(slot) if slot.tx.borrow().is_some() => {
                slot.validated_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(ErrorKind::Store(
                "Nothing stored for key to mark valid".to_string(),
            )),
        }
    }

    async fn is_valid(&self, param: &P) -> Outcome<bool> {
        let now = Utc::now();
        let valid = self
            .slots()
            .get(param)
            .and_then(|slot| slot.validated_at)
            .map(|at| self.freshness.is_fresh(at, now))
            .unwrap_or(false);
        Ok(valid)
    }

    async fn current(&self, param: &P) -> Outcome<Option<T>> {
        Ok(self.get(param))
    }

    fn read(&self, param: &P) -> BoxStream<'static, Outcome<T>> {
        let rx = self
            .slots()
            .entry(param.clone())
            .or_insert_with(Slot::empty)
            .tx
            .subscribe();
        watch_stream(rx, true)
    }
}
