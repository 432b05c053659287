use std::fmt::Debug;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::shared::SharedStream;
use crate::error::{ErrorKind, Outcome};

/// Owns the producer task of one cache entry.
///
/// Dropping a scope cancels its token and aborts the task; `cancel` does the
/// same and additionally waits for the task to finish.
struct Scope {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Scope {
    async fn cancel(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "Producer task panicked before cancellation");
                }
            }
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(ref task) = self.task {
            task.abort();
        }
    }
}

struct CacheEntry<P, T> {
    key: P,
    stream: SharedStream<T>,
    scope: Scope,
}

impl<P, T: Clone> CacheEntry<P, T> {
    /// Close the stream first so nothing the producer emits from here on
    /// reaches subscribers, then stop the producer.
    async fn teardown(self) {
        self.stream.close();
        self.scope.cancel().await;
    }
}

/// Single-slot, single-flight live value cache keyed by a comparable parameter.
///
/// At most one entry (and so one producer task) exists at a time. Asking for
/// the key already held returns the same `SharedStream`; asking for any other
/// key cancels the current producer before starting a new one.
pub struct ParametrizedCache<P, T> {
    name: &'static str,
    current: Mutex<Option<CacheEntry<P, T>>>,
}

impl<P, T> ParametrizedCache<P, T>
where
    P: Clone + PartialEq + Debug + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the live stream for `param`, starting `producer` only when the
    /// cached key differs.
    ///
    /// The producer receives the parameter and the cancellation token of the
    /// scope it runs in. An `Err` item ends the stream for every subscriber.
    pub async fn get_or_create<F, S>(&self, param: P, producer: F) -> SharedStream<T>
    where
        F: FnOnce(P, CancellationToken) -> S,
        S: Stream<Item = Outcome<T>> + Send + 'static,
    {
        let mut current = self.current.lock().await;

        if let Some(entry) = current.as_ref() {
            if entry.key == param {
                debug!(cache = self.name, key = ?param, "Reusing live entry");
                return entry.stream.clone();
            }
        }

        self.install(&mut current, param, producer).await
    }

    /// Cancel whatever is running and start `producer` for `param`, even when
    /// the cached key is equal.
    pub async fn replace<F, S>(&self, param: P, producer: F) -> SharedStream<T>
    where
        F: FnOnce(P, CancellationToken) -> S,
        S: Stream<Item = Outcome<T>> + Send + 'static,
    {
        let mut current = self.current.lock().await;
        self.install(&mut current, param, producer).await
    }

    /// Key of the live entry, if any.
    pub async fn current_key(&self) -> Option<P> {
        self.current.lock().await.as_ref().map(|entry| entry.key.clone())
    }

    /// Tear down the live entry, ending its stream for all subscribers.
    pub async fn clear(&self) {
        let old = self.current.lock().await.take();
        if let Some(old) = old {
            debug!(cache = self.name, key = ?old.key, "Clearing live entry");
            old.teardown().await;
        }
    }

    async fn install<F, S>(
        &self,
        current: &mut Option<CacheEntry<P, T>>,
        param: P,
        producer: F,
    ) -> SharedStream<T>
    where
        F: FnOnce(P, CancellationToken) -> S,
        S: Stream<Item = Outcome<T>> + Send + 'static,
    {
        if let Some(old) = current.take() {
            debug!(cache = self.name, old = ?old.key, new = ?param, "Replacing live entry");
            old.teardown().await;
        } else {
            debug!(cache = self.name, key = ?param, "Creating live entry");
        }

        let token = CancellationToken::new();
        let stream = SharedStream::new();
        let produced = producer(param.clone(), token.clone());

        let task = tokio::spawn(pump(self.name, produced, stream.clone(), token.clone()));

        *current = Some(CacheEntry {
            key: param,
            stream: stream.clone(),
            scope: Scope {
                token,
                task: Some(task),
            },
        });
        stream
    }
}

/// Forward producer items into the shared stream until the producer ends,
/// fails, or the scope is cancelled.
async fn pump<T, S>(cache: &'static str, produced: S, stream: SharedStream<T>, token: CancellationToken)
where
    T: Clone + Send + 'static,
    S: Stream<Item = Outcome<T>> + Send + 'static,
{
    let forward = async {
        futures::pin_mut!(produced);
        while let Some(item) = produced.next().await {
            if token.is_cancelled() {
                return;
            }
            match item {
                Ok(value) => {
                    if !stream.publish(value) {
                        return;
                    }
                }
                Err(e) => {
                    debug!(cache, error = %e, "Producer failed");
                    stream.fail(e);
                    return;
                }
            }
        }
        stream.close();
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => {}
        finished = AssertUnwindSafe(forward).catch_unwind() => {
            if finished.is_err() {
                warn!(cache, "Producer panicked");
                stream.fail(ErrorKind::Precondition(format!("{} producer panicked", cache)));
            }
        }
    }
}

impl<P, T> Drop for ParametrizedCache<P, T> {
    fn drop(&mut self) {
        if let Some(entry) = self.current.get_mut().take() {
            entry.stream.close();
            // Scope's Drop cancels the token and aborts the producer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use futures::{future, stream};

    /// Producer that emits one value and then stays pending until cancelled.
    fn pending_after(value: &'static str) -> impl Stream<Item = Outcome<&'static str>> + Send {
        stream::once(async move { Ok(value) }).chain(stream::pending())
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_producer() {
        let cache = Arc::new(ParametrizedCache::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create(("outlet-1", "cs"), move |_, _| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        pending_after("menu")
                    })
                    .await
            }));
        }

        let mut streams = Vec::new();
        for handle in handles {
            streams.push(handle.await.expect("task panicked"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(streams.iter().all(|s| s.ptr_eq(&streams[0])));
    }

    #[tokio::test]
    async fn test_equal_keys_from_distinct_instances_reuse_entry() {
        #[derive(Debug, Clone, PartialEq)]
        struct Params {
            outlet: String,
            lang: String,
        }

        let cache = ParametrizedCache::new("test");
        let first = cache
            .get_or_create(
                Params { outlet: "a".into(), lang: "en".into() },
                |_, _| pending_after("x"),
            )
            .await;
        let second = cache
            .get_or_create(
                Params { outlet: "a".into(), lang: "en".into() },
                |_, _| -> futures::stream::Pending<Outcome<&'static str>> {
                    panic!("producer must not run for an equal key")
                },
            )
            .await;

        assert!(first.ptr_eq(&second));
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_key_change_cancels_previous_producer() {
        let cache = ParametrizedCache::new("test");
        let stopped = Arc::new(AtomicBool::new(false));
        let seen_token = Arc::new(StdMutex::new(None));

        let old = cache
            .get_or_create("cs", {
                let stopped = Arc::clone(&stopped);
                let seen_token = Arc::clone(&seen_token);
                move |_, token: CancellationToken| {
                    *seen_token.lock().unwrap() = Some(token);
                    let guard = DropFlag(stopped);
                    stream::once(async move {
                        let _guard = guard;
                        future::pending::<()>().await;
                        Ok("late value from cs")
                    })
                }
            })
            .await;
        let mut old_sub = old.subscribe();

        let new = cache
            .get_or_create("en", |_, _| pending_after("en menu"))
            .await;
        let mut new_sub = new.subscribe();

        // Replacement waits for the old producer to be torn down
        assert!(stopped.load(Ordering::SeqCst));
        let token = seen_token.lock().unwrap().clone().expect("producer ran");
        assert!(token.is_cancelled());

        assert!(!old.ptr_eq(&new));
        assert_eq!(old_sub.next().await, None);
        assert_eq!(new_sub.next().await, Some(Ok("en menu")));
        assert_eq!(cache.current_key().await, Some("en"));
    }

    #[tokio::test]
    async fn test_every_transition_runs_producer() {
        let cache = ParametrizedCache::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        for lang in ["cs", "en", "cs"] {
            let calls = Arc::clone(&calls);
            cache
                .get_or_create(lang, move |_, _| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    pending_after("menu")
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_receives_latest_value() {
        let cache = ParametrizedCache::new("test");
        let stream = cache.get_or_create(1u32, |_, _| pending_after("first")).await;

        let mut early = stream.subscribe();
        assert_eq!(early.next().await, Some(Ok("first")));

        let mut late = stream.subscribe();
        let got = tokio::time::timeout(Duration::from_millis(100), late.next())
            .await
            .expect("late subscriber had to wait for a new emission");
        assert_eq!(got, Some(Ok("first")));
    }

    #[tokio::test]
    async fn test_producer_failure_reaches_all_subscribers() {
        let cache: ParametrizedCache<u32, u32> = ParametrizedCache::new("test");
        let stream = cache
            .get_or_create(1, |_, _| {
                stream::iter(vec![Ok(1), Err(ErrorKind::Payload("bad record".into())), Ok(2)])
            })
            .await;

        let mut sub = stream.subscribe();
        let mut seen = Vec::new();
        while let Some(item) = sub.next().await {
            seen.push(item);
        }

        // Late subscribers still see the terminal error, never the value after it
        assert!(matches!(seen.last(), Some(Err(ErrorKind::Payload(_)))));
        assert!(!seen.contains(&Ok(2)));
        assert!(matches!(stream.latest(), Some(Err(ErrorKind::Payload(_)))));
    }

    #[tokio::test]
    async fn test_producer_panic_ends_stream_with_error() {
        let cache: ParametrizedCache<u32, u8> = ParametrizedCache::new("test");
        let stream = cache
            .get_or_create(1, |_, _| {
                stream::iter([1u8, 2]).map(|v| {
                    if v == 2 {
                        panic!("decoder bug");
                    }
                    Ok(v)
                })
            })
            .await;
        let mut sub = stream.subscribe();

        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            let mut seen = Vec::new();
            while let Some(item) = sub.next().await {
                seen.push(item);
            }
            seen
        })
        .await
        .expect("subscriber never saw the end of the stream");

        assert!(matches!(seen.last(), Some(Err(ErrorKind::Precondition(_)))));
        assert!(stream.is_closed());
    }

    #[tokio::test]
    async fn test_replace_restarts_equal_key() {
        let cache = ParametrizedCache::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let counting = |calls: Arc<AtomicUsize>| {
            move |_: &'static str, _: CancellationToken| {
                calls.fetch_add(1, Ordering::SeqCst);
                pending_after("menu")
            }
        };

        let first = cache.get_or_create("cs", counting(Arc::clone(&calls))).await;
        let second = cache.replace("cs", counting(Arc::clone(&calls))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!first.ptr_eq(&second));
        assert!(first.is_closed());
    }

    #[tokio::test]
    async fn test_clear_ends_stream() {
        let cache = ParametrizedCache::new("test");
        let stream = cache.get_or_create("cs", |_, _| pending_after("menu")).await;
        let mut sub = stream.subscribe();

        cache.clear().await;

        let mut rest = Vec::new();
        while let Some(item) = sub.next().await {
            rest.push(item);
        }
        assert!(rest.len() <= 1);
        assert!(stream.is_closed());
        assert_eq!(cache.current_key().await, None);
    }
}
