//! Hot multicast stream that replays its latest emission to new subscribers.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{ErrorKind, Outcome};

/// One item delivered to subscribers. An `Err` is terminal.
pub type Emission<T> = Outcome<T>;

struct State<T> {
    latest: Option<Emission<T>>,
    subscribers: Vec<mpsc::UnboundedSender<Emission<T>>>,
    closed: bool,
}

/// Cloneable handle to a shared, replay-latest stream.
///
/// Clones point at the same underlying stream. Every subscriber receives the
/// most recent emission immediately, then every later emission in order.
/// Once closed (producer finished, failed, or cancelled) no further values are
/// accepted; late subscribers still receive the last emission before the end.
pub struct SharedStream<T> {
    inner: Arc<Mutex<State<T>>>,
}

impl<T> Clone for SharedStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SharedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SharedStream")
            .field("subscribers", &state.subscribers.len())
            .field("has_latest", &state.latest.is_some())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> SharedStream<T> {
    fn state(&self) -> MutexGuard<'_, State<T>> {
        // A panic while holding this lock cannot leave the state half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Whether both handles refer to the same stream instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stop accepting values and end every subscription.
    pub(crate) fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.subscribers.clear();
    }
}

impl<T: Clone> SharedStream<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                latest: None,
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Subscribe, receiving the latest emission (if any) right away.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        if let Some(latest) = state.latest.clone() {
            // Receiver is alive, send cannot fail
            let _ = tx.send(latest);
        }
        if !state.closed {
            state.subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// Most recent emission, without subscribing.
    pub fn latest(&self) -> Option<Emission<T>> {
        self.state().latest.clone()
    }

    /// Emit a value to all subscribers. Returns false once the stream is closed.
    pub(crate) fn publish(&self, value: T) -> bool {
        self.emit(Ok(value), false)
    }

    /// Emit a terminal failure and close the stream.
    pub(crate) fn fail(&self, error: ErrorKind) -> bool {
        self.emit(Err(error), true)
    }

    fn emit(&self, emission: Emission<T>, terminal: bool) -> bool {
        let mut state = self.state();
        if state.closed {
            return false;
        }
        state
            .subscribers
            .retain(|tx| tx.send(emission.clone()).is_ok());
        state.latest = Some(emission);
        if terminal {
            state.closed = true;
            state.subscribers.clear();
        }
        true
    }
}

/// A single subscriber's view of a `SharedStream`.
///
/// Ends (`None`) when the stream is closed or its producer is cancelled.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Emission<T>>,
}

impl<T> Stream for Subscription<T> {
    type Item = Emission<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
