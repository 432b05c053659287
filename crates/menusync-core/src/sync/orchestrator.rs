use std::fmt::Debug;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SyncResult;
use crate::api::{Decoded, RemoteSource};
use crate::error::{ErrorAggregate, ErrorKind, Outcome};
use crate::store::LocalStore;

/// Drives refresh attempts from a remote source into a local store.
///
/// The orchestrator never hands data to consumers directly: it writes into
/// the store, and consumers observe the store.
pub struct SyncOrchestrator<Src, St> {
    name: &'static str,
    source: Src,
    store: St,
}

impl<Src, St> SyncOrchestrator<Src, St> {
    pub fn new(name: &'static str, source: Src, store: St) -> Self {
        Self {
            name,
            source,
            store,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &Src {
        &self.source
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Refresh `param` unless stored data is still valid and `force` is false.
    pub async fn sync<P>(&self, param: &P, force: bool) -> Outcome<SyncResult>
    where
        P: Debug + Send + Sync,
        Src: RemoteSource<P>,
        St: LocalStore<P, Src::Value>,
    {
        self.sync_cancellable(param, force, &CancellationToken::new())
            .await
    }

    /// Like `sync`, but abandons the fetch as soon as `cancel` fires and
    /// never writes to the store after cancellation.
    ///
    /// A cancelled attempt returns `ErrorKind::Cancelled`. Writes already
    /// applied before cancellation are left in place.
    pub async fn sync_cancellable<P>(
        &self,
        param: &P,
        force: bool,
        cancel: &CancellationToken,
    ) -> Outcome<SyncResult>
    where
        P: Debug + Send + Sync,
        Src: RemoteSource<P>,
        St: LocalStore<P, Src::Value>,
    {
        if !force && self.store.is_valid(param).await? {
            debug!(source = self.name, key = ?param, "Stored data still valid, skipping sync");
            return Ok(SyncResult::Skipped);
        }

        debug!(source = self.name, key = ?param, force, "Fetching from remote");
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.cancelled(param)),
            fetched = self.source.fetch(param) => fetched,
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(e) if !e.is_recoverable() => return Err(e),
            Err(ErrorKind::TransportUnreachable(reason)) => {
                warn!(source = self.name, key = ?param, reason = %reason, "Remote source unreachable");
                return Ok(SyncResult::Unavailable);
            }
            Err(e) => {
                warn!(source = self.name, key = ?param, error = %e, "Remote payload unusable");
                return Ok(SyncResult::Problem(ErrorAggregate::single(e)));
            }
        };

        let Decoded { value, errors } = self.source.decode(raw);

        if cancel.is_cancelled() {
            return Err(self.cancelled(param));
        }

        let wrote = match value {
            Some(value) => {
                self.store.write(param, value).await?;
                true
            }
            None => false,
        };

        if errors.is_empty() {
            if !wrote {
                return Err(ErrorKind::Precondition(format!(
                    "{} source decoded neither data nor errors",
                    self.name
                )));
            }
            self.store.mark_valid(param).await?;
            info!(source = self.name, key = ?param, "Sync updated");
            return Ok(SyncResult::Updated);
        }

        // Partial data stays invalid so the next sync retries it
        let problems = ErrorAggregate::new(errors)?;
        warn!(
            source = self.name,
            key = ?param,
            problems = problems.len(),
            partial = wrote,
            "Sync finished with problems"
        );
        Ok(SyncResult::Problem(problems))
    }

    fn cancelled<P: Debug>(&self, param: &P) -> ErrorKind {
        debug!(source = self.name, key = ?param, "Sync cancelled");
        ErrorKind::Cancelled(format!("{} sync for {:?}", self.name, param))
    }
}
