//! Live, self-refreshing views over one kind of synced data.
//!
//! A `Repository` pairs a `ParametrizedCache` with a `SyncOrchestrator`.
//! Observing a key starts a producer that follows the store and, in the same
//! cancellation scope, runs one sync for that key. The sync only writes to
//! the store; the refreshed data reaches subscribers through the store's
//! reactive read.

use std::fmt::Debug;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::api::RemoteSource;
use crate::cache::{ParametrizedCache, SharedStream};
use crate::error::{ErrorKind, Outcome};
use crate::store::LocalStore;
use crate::sync::{SyncOrchestrator, SyncResult};

/// Progress of the sync that accompanies a live view.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Running,
    Done(SyncResult),
    Failed(ErrorKind),
}

/// Latest known state of a key: stored data plus the accompanying sync.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub sync: SyncState,
}

impl<T> Snapshot<T> {
    fn loading() -> Self {
        Self {
            data: None,
            sync: SyncState::Running,
        }
    }

    pub fn is_syncing(&self) -> bool {
        matches!(self.sync, SyncState::Running)
    }

    pub fn sync_result(&self) -> Option<&SyncResult> {
        match &self.sync {
            SyncState::Done(result) => Some(result),
            _ => None,
        }
    }
}

enum Change<T> {
    Stored(Outcome<T>),
    /// Sync outcome plus the store contents once it finished.
    Synced(Outcome<SyncResult>, Outcome<Option<T>>),
}

pub struct Repository<P, Src, St>
where
    Src: RemoteSource<P>,
{
    orchestrator: Arc<SyncOrchestrator<Src, St>>,
    cache: ParametrizedCache<P, Snapshot<Src::Value>>,
}

impl<P, Src, St> Repository<P, Src, St>
where
    P: Clone + PartialEq + Debug + Send + Sync + 'static,
    Src: RemoteSource<P>,
    Src::Value: Clone + Send + Sync + 'static,
    St: LocalStore<P, Src::Value>,
{
    pub fn new(name: &'static str, source: Src, store: St) -> Self {
        Self {
            orchestrator: Arc::new(SyncOrchestrator::new(name, source, store)),
            cache: ParametrizedCache::new(name),
        }
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator<Src, St> {
        &self.orchestrator
    }

    /// Live view of `param`. Concurrent and repeated calls for an equal key
    /// share one view and one sync; a different key replaces it.
    pub async fn observe(&self, param: P) -> SharedStream<Snapshot<Src::Value>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        self.cache
            .get_or_create(param, move |param, cancel| {
                live(orchestrator, param, false, cancel)
            })
            .await
    }

    /// Restart the view of `param` with a forced sync, even if the current
    /// view is for the same key.
    pub async fn refresh(&self, param: P) -> SharedStream<Snapshot<Src::Value>> {
        let orchestrator = Arc::clone(&self.orchestrator);
        self.cache
            .replace(param, move |param, cancel| {
                live(orchestrator, param, true, cancel)
            })
            .await
    }

    /// Stop the live view and its sync.
    pub async fn close(&self) {
        self.cache.clear().await;
    }
}

fn live<P, Src, St>(
    orchestrator: Arc<SyncOrchestrator<Src, St>>,
    param: P,
    force: bool,
    cancel: CancellationToken,
) -> impl Stream<Item = Outcome<Snapshot<Src::Value>>> + Send + 'static
where
    P: Debug + Send + Sync + 'static,
    Src: RemoteSource<P>,
    Src::Value: Clone + Send + Sync + 'static,
    St: LocalStore<P, Src::Value>,
{
    let stored = orchestrator.store().read(&param).map(Change::Stored);
    let synced = stream::once(async move {
        let result = orchestrator
            .sync_cancellable(&param, force, &cancel)
            .await;
        // The store's read stream may not have delivered the write yet
        let latest = match &result {
            Ok(_) => orchestrator.store().current(&param).await,
            Err(_) => Ok(None),
        };
        Change::Synced(result, latest)
    });

    let updates = stream::select(stored, synced).scan(Snapshot::loading(), |snapshot, change| {
        let next = match change {
            Change::Stored(Ok(data)) => {
                snapshot.data = Some(data);
                Ok(snapshot.clone())
            }
            // Unreadable store ends the view
            Change::Stored(Err(e)) => Err(e),
            Change::Synced(_, Err(e)) => Err(e),
            Change::Synced(Ok(result), Ok(latest)) => {
                if latest.is_some() {
                    snapshot.data = latest;
                }
                snapshot.sync = SyncState::Done(result);
                Ok(snapshot.clone())
            }
            Change::Synced(Err(e), Ok(_)) => {
                snapshot.sync = SyncState::Failed(e);
                Ok(snapshot.clone())
            }
        };
        future::ready(Some(next))
    });

    stream::once(future::ready(Ok(Snapshot::loading()))).chain(updates)
}
