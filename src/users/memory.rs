use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::dto::UserUpdate;
use super::repo::{StoreError, UserStore};
use super::repo_types::{Certification, NewUserAccount, UserAccount};

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, UserAccount>,
}

impl Inner {
    fn row_mut(&mut self, id: i64) -> Result<&mut UserAccount, StoreError> {
        self.rows.get_mut(&id).ok_or(StoreError::RowNotFound(id))
    }
}

/// Process-local store with the same rules as the `users` table. Each write
/// runs entirely under the lock.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: Mutex<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds existing rows. Ids keep their values; new inserts continue after the highest.
    pub fn with_accounts(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        let rows: BTreeMap<i64, UserAccount> = accounts.into_iter().map(|u| (u.id, u)).collect();
        let next_id = rows.keys().next_back().copied().unwrap_or(0);
        Self {
            inner: Mutex::new(Inner { next_id, rows }),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.rows.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn insert(&self, user: NewUserAccount) -> Result<UserAccount, StoreError> {
        if user.email != user.email.to_lowercase() {
            return Err(anyhow::anyhow!("email must be lower-case: {}", user.email).into());
        }
        let mut inner = self.inner.lock().await;
        if inner.rows.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        if inner
            .rows
            .values()
            .any(|u| u.certification_code == user.certification_code)
        {
            return Err(StoreError::Duplicate("certification code"));
        }
        inner.next_id += 1;
        let row = user.with_id(inner.next_id);
        inner.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_profile(
        &self,
        id: i64,
        patch: &UserUpdate,
    ) -> Result<UserAccount, StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner.row_mut(id)?;
        if let Some(address) = &patch.address {
            row.address = address.clone();
        }
        if let Some(nickname) = &patch.nickname {
            row.nickname = nickname.clone();
        }
        Ok(row.clone())
    }

    async fn record_login(
        &self,
        id: i64,
        now: OffsetDateTime,
    ) -> Result<OffsetDateTime, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.row_mut(id)?.record_login(now))
    }

    async fn activate(&self, id: i64, code: &str) -> Result<Certification, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.row_mut(id)?.certify(code))
    }
}
