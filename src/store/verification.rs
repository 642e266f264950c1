//! `verification` relation: pending email verification codes.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::Instrument;

use super::{expect_one_row, users::query_span, StoreError};
use crate::clock::SharedClock;

pub const DEFAULT_CODE_TTL_SECONDS: i64 = 15 * 60;

#[derive(Clone, Debug)]
pub struct VerificationStore {
    pool: SqlitePool,
    clock: SharedClock,
    ttl: Duration,
}

impl VerificationStore {
    #[must_use]
    pub fn new(pool: SqlitePool, clock: SharedClock) -> Self {
        Self {
            pool,
            clock,
            ttl: Duration::seconds(DEFAULT_CODE_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Record a code for the user and return its expiration. Older codes stay
    /// valid until they expire or one of them is consumed.
    ///
    /// # Errors
    /// `Unavailable` on IO failure.
    pub async fn issue_code(&self, user_id: i64, code: &str) -> Result<DateTime<Utc>, StoreError> {
        let query = "INSERT INTO verification (user, code, expiration) VALUES ($1, $2, $3)";
        let expiration = self.clock.now() + self.ttl;
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(code)
            .bind(expiration)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;
        expect_one_row(&result)?;
        Ok(expiration)
    }

    /// Match a code against the user's outstanding codes and delete all of them
    /// when one is still valid.
    ///
    /// # Errors
    /// `NotFound` when no row matches, `Expired` when every match is past its
    /// expiration, `Unavailable` on IO failure.
    pub async fn consume(&self, user_id: i64, code: &str) -> Result<(), StoreError> {
        let select = "SELECT expiration FROM verification WHERE user = $1 AND code = $2";
        let expirations: Vec<DateTime<Utc>> = sqlx::query_scalar(select)
            .bind(user_id)
            .bind(code)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", select))
            .await?;

        if expirations.is_empty() {
            return Err(StoreError::NotFound);
        }

        let now = self.clock.now();
        if !expirations.iter().any(|expiration| now <= *expiration) {
            return Err(StoreError::Expired);
        }

        // A concurrent consume may have won the race; zero deleted rows means
        // the code was already spent.
        let delete = "DELETE FROM verification WHERE user = $1";
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(delete)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", delete))
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    /// Flip the user's verified flag. Already-verified users stay verified.
    ///
    /// # Errors
    /// `NotFound` when the user no longer exists.
    pub async fn mark_verified(&self, user_id: i64) -> Result<(), StoreError> {
        let query = "UPDATE users SET verified = 1, updated = $1 WHERE id = $2";
        let result = sqlx::query(query)
            .bind(self.clock.now())
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        expect_one_row(&result)
    }

    /// Number of outstanding codes for the user.
    #[cfg(test)]
    pub(crate) async fn pending(&self, user_id: i64) -> Result<i64, StoreError> {
        let query = "SELECT COUNT(*) FROM verification WHERE user = $1";
        let count: i64 = sqlx::query_scalar(query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::store::{test_support::memory_pool, NewUser, UserStore};
    use anyhow::Result;
    use std::sync::Arc;

    struct Fixture {
        clock: Arc<ManualClock>,
        users: UserStore,
        codes: VerificationStore,
        user_id: i64,
    }

    async fn fixture() -> Result<Fixture> {
        let pool = memory_pool().await?;
        let clock = Arc::new(ManualClock::default());
        let users = UserStore::new(pool.clone(), clock.clone());
        let codes = VerificationStore::new(pool, clock.clone());
        let user_id = users
            .create(&NewUser {
                customer: "",
                username: "alice",
                email: "a@x.com",
                password_hash: "hash",
            })
            .await?;
        Ok(Fixture {
            clock,
            users,
            codes,
            user_id,
        })
    }

    #[tokio::test]
    async fn issue_sets_fifteen_minute_expiration() -> Result<()> {
        let f = fixture().await?;
        let expiration = f.codes.issue_code(f.user_id, "ABC123").await?;
        assert_eq!(expiration - f.clock.now(), Duration::minutes(15));
        assert_eq!(f.codes.pending(f.user_id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn consume_deletes_every_code_for_user() -> Result<()> {
        let f = fixture().await?;
        f.codes.issue_code(f.user_id, "AAAAAA").await?;
        f.codes.issue_code(f.user_id, "BBBBBB").await?;

        f.codes.consume(f.user_id, "AAAAAA").await?;
        assert_eq!(f.codes.pending(f.user_id).await?, 0);

        // Single use: the sibling code is gone too.
        assert!(matches!(
            f.codes.consume(f.user_id, "BBBBBB").await,
            Err(StoreError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn second_consume_is_not_found() -> Result<()> {
        let f = fixture().await?;
        f.codes.issue_code(f.user_id, "ABC123").await?;
        f.codes.consume(f.user_id, "ABC123").await?;
        assert!(matches!(
            f.codes.consume(f.user_id, "ABC123").await,
            Err(StoreError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_is_not_found() -> Result<()> {
        let f = fixture().await?;
        f.codes.issue_code(f.user_id, "ABC123").await?;
        assert!(matches!(
            f.codes.consume(f.user_id, "ZZZ999").await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(f.codes.pending(f.user_id).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn expiry_boundary() -> Result<()> {
        let f = fixture().await?;
        f.codes.issue_code(f.user_id, "EDGE01").await?;
        f.clock.advance(Duration::minutes(15));
        f.codes.consume(f.user_id, "EDGE01").await?;

        f.codes.issue_code(f.user_id, "LATE01").await?;
        f.clock.advance(Duration::minutes(15) + Duration::seconds(1));
        assert!(matches!(
            f.codes.consume(f.user_id, "LATE01").await,
            Err(StoreError::Expired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn custom_ttl_is_applied() -> Result<()> {
        let f = fixture().await?;
        let codes = f.codes.clone().with_ttl(Duration::seconds(30));
        let expiration = codes.issue_code(f.user_id, "SHORT1").await?;
        assert_eq!(expiration - f.clock.now(), Duration::seconds(30));
        Ok(())
    }

    #[tokio::test]
    async fn mark_verified_is_idempotent() -> Result<()> {
        let f = fixture().await?;
        f.codes.mark_verified(f.user_id).await?;
        f.codes.mark_verified(f.user_id).await?;
        assert!(f.users.is_verified(f.user_id).await?);
        assert!(matches!(
            f.codes.mark_verified(999).await,
            Err(StoreError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn deleting_user_cascades_codes() -> Result<()> {
        let f = fixture().await?;
        f.codes.issue_code(f.user_id, "ABC123").await?;
        f.users.delete(f.user_id).await?;
        assert_eq!(f.codes.pending(f.user_id).await?, 0);
        Ok(())
    }
}
