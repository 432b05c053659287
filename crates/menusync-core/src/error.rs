//! Error vocabulary shared by every fallible operation in the crate.
//!
//! Expected failures are always values: `Outcome<T>` is a plain `Result`
//! whose error side is the closed `ErrorKind` taxonomy. Partial failures
//! are carried by `ErrorAggregate`, which can never be empty.

use std::fmt;

use thiserror::Error;

/// Result of every fallible operation in the core.
pub type Outcome<T> = Result<T, ErrorKind>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote source could not be reached at all.
    #[error("Remote source unreachable: {0}")]
    TransportUnreachable(String),

    /// A returned payload (or one of its records) failed to parse or validate.
    #[error("Invalid payload: {0}")]
    Payload(String),

    /// Local persistence failed.
    #[error("Local store error: {0}")]
    Store(String),

    /// A programming error, such as building an aggregate from no errors.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// The work was abandoned because its scope was cancelled.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ErrorKind {
    /// Whether sync can fold this error into a `SyncResult` instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::TransportUnreachable(_) | ErrorKind::Payload(_))
    }

    pub fn store(context: impl fmt::Display, err: impl fmt::Display) -> Self {
        ErrorKind::Store(format!("{}: {}", context, err))
    }
}

/// Ordered, guaranteed non-empty collection of errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorAggregate {
    errors: Vec<ErrorKind>,
}

impl ErrorAggregate {
    /// Build an aggregate, rejecting an empty list.
    pub fn new(errors: Vec<ErrorKind>) -> Outcome<Self> {
        if errors.is_empty() {
            return Err(ErrorKind::Precondition(
                "error aggregate requires at least one error".to_string(),
            ));
        }
        Ok(Self { errors })
    }

    pub fn single(error: ErrorKind) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn first(&self) -> &ErrorKind {
        // Non-empty by construction
        &self.errors[0]
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorKind> {
        self.errors.iter()
    }
}

impl fmt::Display for ErrorAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<ErrorKind>> for ErrorAggregate {
    type Error = ErrorKind;

    fn try_from(errors: Vec<ErrorKind>) -> Outcome<Self> {
        Self::new(errors)
    }
}

impl<'a> IntoIterator for &'a ErrorAggregate {
    type Item = &'a ErrorKind;
    type IntoIter = std::slice::Iter<'a, ErrorKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_rejects_empty() {
        let result = ErrorAggregate::new(Vec::new());
        assert!(matches!(result, Err(ErrorKind::Precondition(_))));

        let via_try: Outcome<ErrorAggregate> = Vec::new().try_into();
        assert!(via_try.is_err());
    }

    #[test]
    fn test_aggregate_preserves_order() {
        let aggregate = ErrorAggregate::new(vec![
            ErrorKind::Payload("record 0".to_string()),
            ErrorKind::Payload("record 3".to_string()),
        ])
        .expect("non-empty aggregate");

        assert_eq!(aggregate.len(), 2);
        assert_eq!(aggregate.first(), &ErrorKind::Payload("record 0".to_string()));
        let kinds: Vec<_> = aggregate.iter().cloned().collect();
        assert_eq!(kinds[1], ErrorKind::Payload("record 3".to_string()));
        assert_eq!(
            aggregate.to_string(),
            "Invalid payload: record 0; Invalid payload: record 3"
        );
    }

    #[test]
    fn test_outcome_map_only_touches_success() {
        let ok: Outcome<i32> = Ok(2);
        assert_eq!(ok.map(|v| v * 10), Ok(20));

        let failed: Outcome<i32> = Err(ErrorKind::Store("disk full".to_string()));
        let mapped = failed.clone().map(|v| v * 10);
        assert_eq!(mapped, failed);

        // Identity and composition
        let ok: Outcome<i32> = Ok(3);
        assert_eq!(ok.clone().map(|v| v), ok);
        assert_eq!(
            ok.clone().map(|v| v + 1).map(|v| v * 2),
            ok.map(|v| (v + 1) * 2)
        );
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(ErrorKind::TransportUnreachable("dns".into()).is_recoverable());
        assert!(ErrorKind::Payload("bad".into()).is_recoverable());
        assert!(!ErrorKind::Store("io".into()).is_recoverable());
        assert!(!ErrorKind::Precondition("empty".into()).is_recoverable());
        assert!(!ErrorKind::Cancelled("key changed".into()).is_recoverable());
    }
}
