//! Migration deployment with recovery
//!
//! Wraps the embedded sqlx migrator with the history-table repairs that
//! otherwise need a DBA: clearing failed records, baselining migrations whose
//! objects already exist, and pushing the full schema as a last resort.

pub mod recovery;

use sqlx::migrate::Migrator;
use sqlx::{Executor, PgPool};
use thiserror::Error;

use crate::config::MigrationConfig;
use crate::db::{MIGRATOR, SCHEMA_SQL};

pub use recovery::{
    backoff_delay, classify_failure, merge_status, FailureKind, HistoryRecord, MigrationState,
    MigrationStatus,
};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migrations failed after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("unrecoverable migration error: {0}")]
    Fatal(String),

    #[error("migration {0} is not embedded in this binary")]
    UnknownVersion(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How `resolve` should record a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    RolledBack,
}

/// How a deploy ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Migrated { attempts: u32 },
    /// Migrations could not be recovered and the schema was pushed instead
    SchemaPushed { reason: String },
}

/// The operations the deploy loop drives, split out so the loop can run
/// against a scripted database in tests
pub(crate) trait MigrationTarget {
    /// Run pending migrations; the error is the driver's message
    async fn apply(&self) -> Result<(), String>;
    async fn clear_failed(&self) -> Result<(), MigrationError>;
    async fn mark_first_pending_applied(&self) -> Result<(), MigrationError>;
    async fn push(&self) -> Result<(), MigrationError>;
}

pub(crate) async fn deploy_with<T: MigrationTarget>(
    target: &T,
    policy: &MigrationConfig,
    allow_push: bool,
) -> Result<DeployOutcome, MigrationError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();
    let mut attempts = 0;

    while attempts < max_attempts {
        attempts += 1;

        let message = match target.apply().await {
            Ok(()) => {
                tracing::info!(attempts, "migrations up to date");
                return Ok(DeployOutcome::Migrated { attempts });
            }
            Err(message) => message,
        };

        let kind = classify_failure(&message);
        tracing::warn!(attempt = attempts, ?kind, error = %message, "migration attempt failed");
        last_error = message;

        let repaired = match kind {
            FailureKind::Transient if attempts < max_attempts => {
                tokio::time::sleep(backoff_delay(policy.retry_delay_ms, attempts)).await;
                Ok(())
            }
            FailureKind::Transient => Ok(()),
            FailureKind::Dirty => target.clear_failed().await,
            FailureKind::AlreadyExists => target.mark_first_pending_applied().await,
            FailureKind::Fatal => break,
        };

        // A failed repair still counts as an attempt
        if let Err(e) = repaired {
            tracing::warn!(error = %e, "history repair failed");
        }
    }

    if !allow_push {
        return Err(if classify_failure(&last_error) == FailureKind::Fatal {
            MigrationError::Fatal(last_error)
        } else {
            MigrationError::Exhausted {
                attempts,
                last_error,
            }
        });
    }

    tracing::warn!(reason = %last_error, "falling back to schema push");
    target.push().await?;

    Ok(DeployOutcome::SchemaPushed { reason: last_error })
}

pub struct MigrationRunner {
    pool: PgPool,
    migrator: &'static Migrator,
    policy: MigrationConfig,
}

const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _sqlx_migrations (
    version BIGINT PRIMARY KEY,
    description TEXT NOT NULL,
    installed_on TIMESTAMPTZ NOT NULL DEFAULT now(),
    success BOOLEAN NOT NULL,
    checksum BYTEA NOT NULL,
    execution_time BIGINT NOT NULL
)
"#;

impl MigrationRunner {
    pub fn new(pool: PgPool, policy: MigrationConfig) -> Self {
        Self {
            pool,
            migrator: &MIGRATOR,
            policy,
        }
    }

    /// Embedded migrations merged with the database history
    pub async fn status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        self.ensure_history_table().await?;

        let history = sqlx::query_as::<_, HistoryRecord>(
            "SELECT version, description, success, installed_on FROM _sqlx_migrations ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(merge_status(&self.known(), &history))
    }

    /// Run pending migrations, repairing the history table between attempts
    pub async fn deploy(&self, allow_push: bool) -> Result<DeployOutcome, MigrationError> {
        deploy_with(self, &self.policy, allow_push).await
    }

    /// Record a migration as applied or remove its record
    pub async fn resolve(&self, version: i64, resolution: Resolution) -> Result<(), MigrationError> {
        if !self.known().iter().any(|(v, _)| *v == version) {
            return Err(MigrationError::UnknownVersion(version));
        }
        self.ensure_history_table().await?;

        match resolution {
            Resolution::Applied => self.record_applied(version).await?,
            Resolution::RolledBack => {
                sqlx::query("DELETE FROM _sqlx_migrations WHERE version = $1")
                    .bind(version)
                    .execute(&self.pool)
                    .await?;
            }
        }

        tracing::info!(version, ?resolution, "migration resolved");
        Ok(())
    }

    /// Apply the idempotent schema snapshot, then baseline every migration
    pub async fn push(&self) -> Result<(), MigrationError> {
        (&self.pool).execute(SCHEMA_SQL).await?;
        self.baseline().await?;

        tracing::info!("schema pushed and migrations baselined");
        Ok(())
    }

    /// Mark every embedded migration as applied
    pub async fn baseline(&self) -> Result<(), MigrationError> {
        self.ensure_history_table().await?;
        for (version, _) in self.known() {
            self.record_applied(version).await?;
        }
        Ok(())
    }

    fn known(&self) -> Vec<(i64, String)> {
        self.migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration())
            .map(|m| (m.version, m.description.to_string()))
            .collect()
    }

    async fn ensure_history_table(&self) -> Result<(), sqlx::Error> {
        (&self.pool).execute(CREATE_HISTORY_TABLE).await?;
        Ok(())
    }

    async fn clear_failed(&self) -> Result<(), MigrationError> {
        let cleared = sqlx::query("DELETE FROM _sqlx_migrations WHERE success = false")
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(cleared, "failed migration records rolled back");
        Ok(())
    }

    async fn mark_first_pending_applied(&self) -> Result<(), MigrationError> {
        let pending = self
            .status()
            .await?
            .into_iter()
            .find(|s| matches!(s.state, MigrationState::Pending | MigrationState::Failed));

        match pending {
            Some(migration) => {
                tracing::info!(
                    version = migration.version,
                    description = %migration.description,
                    "objects already exist; marking migration applied"
                );
                self.record_applied(migration.version).await?;
                Ok(())
            }
            None => Err(MigrationError::Fatal(
                "objects already exist but no migration is pending".to_string(),
            )),
        }
    }

    async fn record_applied(&self, version: i64) -> Result<(), MigrationError> {
        let migration = self
            .migrator
            .iter()
            .find(|m| m.version == version && !m.migration_type.is_down_migration())
            .ok_or(MigrationError::UnknownVersion(version))?;

        sqlx::query(
            r#"
            INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time)
            VALUES ($1, $2, TRUE, $3, 0)
            ON CONFLICT (version) DO UPDATE SET success = TRUE, checksum = EXCLUDED.checksum
            "#,
        )
        .bind(migration.version)
        .bind(&*migration.description)
        .bind(&*migration.checksum)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl MigrationTarget for MigrationRunner {
    async fn apply(&self) -> Result<(), String> {
        self.migrator.run(&self.pool).await.map_err(|e| e.to_string())
    }

    async fn clear_failed(&self) -> Result<(), MigrationError> {
        MigrationRunner::clear_failed(self).await
    }

    async fn mark_first_pending_applied(&self) -> Result<(), MigrationError> {
        MigrationRunner::mark_first_pending_applied(self).await
    }

    async fn push(&self) -> Result<(), MigrationError> {
        MigrationRunner::push(self).await
    }
}
