//! Core library for menusync.
//!
//! Fetches slowly-changing canteen data (menus, prices, info pages) keyed by
//! a parameter set such as outlet and language, caches it locally, and
//! republishes updates to any number of subscribers.
//!
//! - `cache`: single-flight, cancel-on-change live streams per key
//! - `sync`: one refresh attempt, classified into a `SyncResult`
//! - `store`: local reactive storage with pluggable freshness
//! - `api`: remote sources backed by the canteen REST API
//! - `repository`: the pieces above wired into live views

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod store;
pub mod sync;

pub use cache::{ParametrizedCache, SharedStream, Subscription};
pub use config::Config;
pub use error::{ErrorAggregate, ErrorKind, Outcome};
pub use repository::{Repository, Snapshot, SyncState};
pub use sync::{SyncOrchestrator, SyncResult};
