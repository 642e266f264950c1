//! `users` relation.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::fmt;
use tracing::Instrument;

use super::{expect_one_row, StoreError, DB_SYSTEM};
use crate::clock::SharedClock;

const USER_COLUMNS: &str = "id, customer, username, email, password, verified, updated, created";

#[derive(Clone)]
pub struct User {
    pub id: i64,
    /// External billing customer reference, empty until provisioned.
    pub customer: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never plaintext.
    pub password: String,
    pub verified: bool,
    pub updated: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("customer", &self.customer)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("verified", &self.verified)
            .field("updated", &self.updated)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

/// Fields supplied at signup; the password is already hashed.
pub struct NewUser<'a> {
    pub customer: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Clone, Debug)]
pub struct UserStore {
    pool: SqlitePool,
    clock: SharedClock,
}

impl UserStore {
    #[must_use]
    pub fn new(pool: SqlitePool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Insert a new unverified user and return its id.
    ///
    /// # Errors
    /// `Conflict` when the username or email is taken, `Unavailable` on IO failure.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<i64, StoreError> {
        let query = r"
            INSERT INTO users (customer, username, email, password, verified, updated, created)
            VALUES ($1, $2, $3, $4, 0, $5, $5)
        ";
        let now = self.clock.now();
        let result = sqlx::query(query)
            .bind(user.customer)
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;
        expect_one_row(&result)?;
        Ok(result.last_insert_rowid())
    }

    /// # Errors
    /// `NotFound` when no user has this id.
    pub async fn find_by_id(&self, id: i64) -> Result<User, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        row.as_ref().map_or(Err(StoreError::NotFound), user_from_row)
    }

    /// # Errors
    /// `NotFound` when no user has this email.
    pub async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        row.as_ref().map_or(Err(StoreError::NotFound), user_from_row)
    }

    /// Conditional update keyed on id and the current username.
    ///
    /// # Errors
    /// `Conflict` when `new` belongs to another user, `NotFound` when the stored
    /// username is no longer `old`.
    pub async fn update_username(&self, id: i64, new: &str, old: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET username = $1, updated = $2 WHERE id = $3 AND username = $4";
        let result = sqlx::query(query)
            .bind(new)
            .bind(self.clock.now())
            .bind(id)
            .bind(old)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        expect_one_row(&result)
    }

    /// Conditional update keyed on id and the current email.
    ///
    /// # Errors
    /// `Conflict` when `new` belongs to another user, `NotFound` when the stored
    /// email is no longer `old`.
    pub async fn update_email(&self, id: i64, new: &str, old: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET email = $1, updated = $2 WHERE id = $3 AND email = $4";
        let result = sqlx::query(query)
            .bind(new)
            .bind(self.clock.now())
            .bind(id)
            .bind(old)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        expect_one_row(&result)
    }

    /// # Errors
    /// `NotFound` when the user no longer exists.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET password = $1, updated = $2 WHERE id = $3";
        let result = sqlx::query(query)
            .bind(password_hash)
            .bind(self.clock.now())
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        expect_one_row(&result)
    }

    /// Store the billing customer reference provisioned at checkout.
    ///
    /// # Errors
    /// `NotFound` when the user no longer exists.
    pub async fn set_customer(&self, id: i64, customer: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET customer = $1, updated = $2 WHERE id = $3";
        let result = sqlx::query(query)
            .bind(customer)
            .bind(self.clock.now())
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        expect_one_row(&result)
    }

    /// # Errors
    /// `NotFound` when zero rows were deleted.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let query = "DELETE FROM users WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        expect_one_row(&result)
    }

    #[cfg(test)]
    pub(crate) async fn is_verified(&self, id: i64) -> Result<bool, StoreError> {
        let query = "SELECT verified FROM users WHERE id = $1";
        let verified: Option<bool> = sqlx::query_scalar(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        verified.ok_or(StoreError::NotFound)
    }
}

pub(super) fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = DB_SYSTEM,
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        customer: row.try_get("customer")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        verified: row.try_get("verified")?,
        updated: row.try_get("updated")?,
        created: row.try_get("created")?,
    })
}
