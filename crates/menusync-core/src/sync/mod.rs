//! Remote refresh and its classified outcome.
//!
//! `SyncOrchestrator::sync` performs (or skips) one refresh attempt for a key
//! and reduces it to a `SyncResult`. Recoverable problems become result
//! variants; only store failures and programming errors escape as `Err`.

pub mod orchestrator;
pub mod result;

pub use orchestrator::SyncOrchestrator;
pub use result::SyncResult;
