//! Remote data sources.
//!
//! A `RemoteSource` fetches a raw payload for a key and decodes it into a
//! value plus the per-record problems met along the way. Fetch failures mean
//! the source is unreachable (or answered with nothing usable); decode
//! problems are collected instead of aborting the whole payload.
//!
//! `ApiClient` talks to the canteen REST API; `MenuSource` and `InfoSource`
//! adapt it to `RemoteSource`.

pub mod client;
pub mod error;
pub mod sources;

pub use client::ApiClient;
pub use error::ApiError;
pub use sources::{InfoSource, MenuSource};

use std::future::Future;

use crate::error::{ErrorKind, Outcome};

/// A remote source of data for keys of type `P`.
pub trait RemoteSource<P>: Send + Sync + 'static {
    type Raw: Send;
    type Value: Send;

    /// Fetch the raw payload. Unreachability is `ErrorKind::TransportUnreachable`;
    /// a response that cannot be used at all is `ErrorKind::Payload`.
    fn fetch(&self, param: &P) -> impl Future<Output = Outcome<Self::Raw>> + Send;

    /// Decode a payload, keeping every usable record.
    fn decode(&self, raw: Self::Raw) -> Decoded<Self::Value>;
}

/// Result of decoding a payload: the usable value (if any) and the ordered
/// list of problems met while decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: Option<T>,
    pub errors: Vec<ErrorKind>,
}

impl<T> Decoded<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value: Some(value),
            errors: Vec::new(),
        }
    }

    pub fn partial(value: T, errors: Vec<ErrorKind>) -> Self {
        Self {
            value: Some(value),
            errors,
        }
    }

    pub fn rejected(error: ErrorKind) -> Self {
        Self {
            value: None,
            errors: vec![error],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.value.is_some() && self.errors.is_empty()
    }
}
