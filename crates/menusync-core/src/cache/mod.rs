//! Live, in-memory caching of parametrized data streams.
//!
//! `ParametrizedCache` holds at most one live entry: the key it was last asked
//! for, the producer task feeding that key, and the `SharedStream` the
//! producer publishes into. Asking for a different key cancels the producer
//! and starts a new one.
//!
//! Persistence is not handled here; see the `store` module.

pub mod parametrized;
pub mod shared;

pub use parametrized::ParametrizedCache;
pub use shared::{Emission, SharedStream, Subscription};
