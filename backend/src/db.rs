//! Database bootstrap helpers

use sqlx::migrate::Migrator;

/// Versioned migrations embedded at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Idempotent snapshot of the full schema, used as the schema-push fallback
pub const SCHEMA_SQL: &str = include_str!("../schema.sql");
