use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use time::OffsetDateTime;

use crate::users::dto::UserUpdate;
use crate::users::repo_types::{Certification, NewUserAccount, UserAccount};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column already holds this value.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error("user {0} does not exist")]
    RowNotFound(i64),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence port for user accounts. Email and certification code are unique
/// and emails are stored lower-case.
///
/// Every write touches one row atomically and only the columns it owns:
/// `update_profile` never writes status, `record_login` only the login stamp,
/// `activate` only the status.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<UserAccount>, StoreError>;
    /// Inserts a new row and returns it with the assigned id.
    async fn insert(&self, user: NewUserAccount) -> Result<UserAccount, StoreError>;
    /// Overwrites the supplied profile fields, leaving the rest as stored.
    async fn update_profile(&self, id: i64, patch: &UserUpdate)
        -> Result<UserAccount, StoreError>;
    /// Advances `last_login_at` to `now` (or just past the stored stamp).
    async fn record_login(&self, id: i64, now: OffsetDateTime)
        -> Result<OffsetDateTime, StoreError>;
    /// Presents a certification code and persists the resulting transition.
    async fn activate(&self, id: i64, code: &str) -> Result<Certification, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_constraint_violation(e: sqlx::Error, what: &'static str) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        match db_err.constraint() {
            Some("users_email_key") => return StoreError::Duplicate("email"),
            Some("users_certification_code_key") => {
                return StoreError::Duplicate("certification code")
            }
            _ => {}
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

/// Locks the row for the rest of the transaction.
async fn lock_user_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
) -> Result<UserAccount, StoreError> {
    sqlx::query_as::<_, UserAccount>(
        r#"
        SELECT id, email, nickname, address, status, certification_code, last_login_at
        FROM users
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .context("lock user")?
    .ok_or(StoreError::RowNotFound(id))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, email, nickname, address, status, certification_code, last_login_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserAccount>, StoreError> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, email, nickname, address, status, certification_code, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUserAccount) -> Result<UserAccount, StoreError> {
        sqlx::query_as::<_, UserAccount>(
            r#"
            INSERT INTO users (email, nickname, address, status, certification_code, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, nickname, address, status, certification_code, last_login_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.nickname)
        .bind(&user.address)
        .bind(user.status)
        .bind(&user.certification_code)
        .bind(user.last_login_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_constraint_violation(e, "insert user"))
    }

    async fn update_profile(
        &self,
        id: i64,
        patch: &UserUpdate,
    ) -> Result<UserAccount, StoreError> {
        sqlx::query_as::<_, UserAccount>(
            r#"
            UPDATE users
               SET address = COALESCE($2, address),
                   nickname = COALESCE($3, nickname)
             WHERE id = $1
            RETURNING id, email, nickname, address, status, certification_code, last_login_at
            "#,
        )
        .bind(id)
        .bind(patch.address.as_deref())
        .bind(patch.nickname.as_deref())
        .fetch_optional(&self.db)
        .await
        .context("update user profile")?
        .ok_or(StoreError::RowNotFound(id))
    }

    async fn record_login(
        &self,
        id: i64,
        now: OffsetDateTime,
    ) -> Result<OffsetDateTime, StoreError> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut user = lock_user_tx(&mut tx, id).await?;
        let stamp = user.record_login(now);

        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(stamp)
            .execute(&mut *tx)
            .await
            .context("record login")?;
        tx.commit().await.context("commit tx")?;
        Ok(stamp)
    }

    async fn activate(&self, id: i64, code: &str) -> Result<Certification, StoreError> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut user = lock_user_tx(&mut tx, id).await?;
        let outcome = user.certify(code);

        if outcome == Certification::Activated {
            sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
                .bind(id)
                .bind(user.status)
                .execute(&mut *tx)
                .await
                .context("activate user")?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(outcome)
    }
}
