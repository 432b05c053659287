use std::fmt;

use crate::error::ErrorAggregate;

/// How a refresh attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Remote data was fetched and persisted in full.
    Updated,
    /// Stored data is still valid and the refresh was not forced.
    Skipped,
    /// The remote source could not be reached; nothing was written.
    Unavailable,
    /// The refresh ran into recoverable errors; stored data may be partial or unchanged.
    Problem(ErrorAggregate),
}

impl SyncResult {
    /// Whether consumers should show an error indicator.
    pub fn needs_attention(&self) -> bool {
        matches!(self, SyncResult::Unavailable | SyncResult::Problem(_))
    }

    /// User-facing summary. Problems list every aggregated error.
    pub fn describe(&self) -> String {
        match self {
            SyncResult::Updated => "Up to date".to_string(),
            SyncResult::Skipped => "Nothing to refresh".to_string(),
            SyncResult::Unavailable => "Offline - showing saved data".to_string(),
            SyncResult::Problem(errors) => {
                let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
                format!(
                    "Refreshed with {} problem{}:\n{}",
                    errors.len(),
                    if errors.len() == 1 { "" } else { "s" },
                    lines.join("\n")
                )
            }
        }
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncResult::Updated => f.write_str("updated"),
            SyncResult::Skipped => f.write_str("skipped"),
            SyncResult::Unavailable => f.write_str("unavailable"),
            SyncResult::Problem(errors) => write!(f, "problem ({})", errors.len()),
        }
    }
}
