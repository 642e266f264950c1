//! Relational store for accounts and verification codes.
//!
//! Every statement is a single parameterized query wrapped in a `db.query`
//! span. Store failures are classified exactly once, here, into
//! [`StoreError`]; callers never look at driver error text.

pub mod users;
pub mod verification;

pub use users::{NewUser, User, UserStore};
pub use verification::VerificationStore;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteQueryResult},
    SqlitePool,
};
use std::{str::FromStr, time::Duration};
use tracing::debug;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

pub(crate) const DB_SYSTEM: &str = "sqlite";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Conflict,
    #[error("no matching row")]
    NotFound,
    #[error("verification code expired")]
    Expired,
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => Self::Conflict,
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Unavailable(other),
        }
    }
}

/// A mutation succeeded only if it touched exactly one row. Zero rows means the
/// target is gone or a proof-of-knowledge value went stale.
pub(crate) fn expect_one_row(result: &SqliteQueryResult) -> Result<(), StoreError> {
    match result.rows_affected() {
        1 => Ok(()),
        _ => Err(StoreError::NotFound),
    }
}

/// Open a pool for the given DSN, creating the database file if needed.
///
/// In-memory databases live only as long as their connection, so they get a
/// single connection that is never recycled.
///
/// # Errors
/// Returns an error if the DSN is invalid or the database cannot be opened.
pub async fn connect(dsn: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(dsn)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = if dsn.contains(":memory:") {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect_with(options)
            .await?
    };

    Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        debug!("applying schema statement {}", index + 1);
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
