use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};

/// Verification state of an account. Only `Active` accounts are visible to lookups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_status", rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Pending,
    Active,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct UserAccount {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub address: String,
    pub status: AccountStatus,
    #[serde(skip_serializing)]
    pub certification_code: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

/// Row handed to the store on insert; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUserAccount {
    pub email: String,
    pub nickname: String,
    pub address: String,
    pub status: AccountStatus,
    pub certification_code: String,
    pub last_login_at: Option<OffsetDateTime>,
}

/// Outcome of presenting a certification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certification {
    Activated,
    AlreadyActive,
    Mismatch,
}

impl NewUserAccount {
    pub fn with_id(self, id: i64) -> UserAccount {
        UserAccount {
            id,
            email: self.email,
            nickname: self.nickname,
            address: self.address,
            status: self.status,
            certification_code: self.certification_code,
            last_login_at: self.last_login_at,
        }
    }
}

impl UserAccount {
    pub fn is_visible(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Applies the certification code. The stored code is compared in constant time.
    pub fn certify(&mut self, code: &str) -> Certification {
        let matches: bool = self
            .certification_code
            .as_bytes()
            .ct_eq(code.as_bytes())
            .into();
        if !matches {
            return Certification::Mismatch;
        }
        match self.status {
            AccountStatus::Pending => {
                self.status = AccountStatus::Active;
                Certification::Activated
            }
            AccountStatus::Active => Certification::AlreadyActive,
        }
    }

    /// Stamps a login at `now`, never moving the timestamp backwards.
    pub fn record_login(&mut self, now: OffsetDateTime) -> OffsetDateTime {
        let stamp = match self.last_login_at {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last_login_at = Some(stamp);
        stamp
    }
}
