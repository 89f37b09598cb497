//! Classification of migration failures and the recovery step for each

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Broad class of a failed migration run, derived from the error text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Database unreachable or overloaded; retry after a delay
    Transient,
    /// A previous run left a failed record in the history table
    Dirty,
    /// The objects a migration creates are already present
    AlreadyExists,
    /// Checksum mismatch, missing versions, SQL errors and anything unrecognised
    Fatal,
}

const TRANSIENT_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "too many connections",
    "too many clients",
    "pool timed out",
    "broken pipe",
];

const DIRTY_MARKERS: &[&str] = &["dirty", "partially applied"];

const ALREADY_EXISTS_MARKERS: &[&str] = &["already exists", "duplicate object", "42p07", "42710"];

/// Classify a migration error by its message.
///
/// Matching is case-insensitive. Dirty history takes precedence, then
/// existing objects, then connectivity.
pub fn classify_failure(message: &str) -> FailureKind {
    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if contains_any(DIRTY_MARKERS) {
        FailureKind::Dirty
    } else if contains_any(ALREADY_EXISTS_MARKERS) {
        FailureKind::AlreadyExists
    } else if contains_any(TRANSIENT_MARKERS) {
        FailureKind::Transient
    } else {
        FailureKind::Fatal
    }
}

/// Linear backoff: `base × attempt`
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(u64::from(attempt.max(1))))
}

/// Where a migration stands against the history table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Applied,
    Pending,
    Failed,
    /// Recorded in the database but not embedded in this binary
    Unknown,
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            MigrationState::Applied => "applied",
            MigrationState::Pending => "pending",
            MigrationState::Failed => "failed",
            MigrationState::Unknown => "unknown",
        };
        f.pad(text)
    }
}

/// One row of `_sqlx_migrations`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRecord {
    pub version: i64,
    pub description: String,
    pub success: bool,
    pub installed_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub state: MigrationState,
    pub installed_on: Option<DateTime<Utc>>,
}

/// Merge embedded migrations with the recorded history, ordered by version
pub fn merge_status(known: &[(i64, String)], history: &[HistoryRecord]) -> Vec<MigrationStatus> {
    let recorded: HashMap<i64, &HistoryRecord> = history.iter().map(|r| (r.version, r)).collect();

    let mut statuses: Vec<MigrationStatus> = known
        .iter()
        .map(|(version, description)| {
            let record = recorded.get(version);
            let state = match record {
                Some(r) if r.success => MigrationState::Applied,
                Some(_) => MigrationState::Failed,
                None => MigrationState::Pending,
            };
            MigrationStatus {
                version: *version,
                description: description.clone(),
                state,
                installed_on: record.map(|r| r.installed_on),
            }
        })
        .collect();

    statuses.extend(
        history
            .iter()
            .filter(|r| !known.iter().any(|(v, _)| *v == r.version))
            .map(|r| MigrationStatus {
                version: r.version,
                description: r.description.clone(),
                state: MigrationState::Unknown,
                installed_on: Some(r.installed_on),
            }),
    );

    statuses.sort_by_key(|s| s.version);
    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transient() {
        for msg in [
            "error communicating with database: Connection refused (os error 111)",
            "pool timed out while waiting for an open connection",
            "error returned from database: sorry, too many clients already",
            "Connection reset by peer",
        ] {
            assert_eq!(classify_failure(msg), FailureKind::Transient, "{msg}");
        }
    }

    #[test]
    fn test_classify_dirty() {
        assert_eq!(
            classify_failure("migration 20240101000001 is partially applied; fix and remove row from `_sqlx_migrations` table"),
            FailureKind::Dirty
        );
    }

    #[test]
    fn test_classify_already_exists() {
        assert_eq!(
            classify_failure(r#"while executing migrations: error returned from database: relation "users" already exists"#),
            FailureKind::AlreadyExists
        );
    }

    #[test]
    fn test_classify_fatal() {
        assert_eq!(
            classify_failure("migration 20240101000000 was previously applied but has been modified"),
            FailureKind::Fatal
        );
        assert_eq!(
            classify_failure("migration 20230101000000 was previously applied but is missing in the resolved migrations"),
            FailureKind::Fatal
        );
        assert_eq!(classify_failure("syntax error at or near \"TABEL\""), FailureKind::Fatal);
    }

    #[test]
    fn test_backoff_is_linear() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 3), Duration::from_millis(1500));
        assert_eq!(backoff_delay(500, 0), Duration::from_millis(500));
    }
}
