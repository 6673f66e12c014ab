use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::error::AccountError;
use crate::mail::{verification_body, Mailer, VERIFICATION_SUBJECT};
use crate::users::dto::{UserCreate, UserUpdate};
use crate::users::repo::UserStore;
use crate::users::repo_types::{AccountStatus, Certification, NewUserAccount, UserAccount};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account lifecycle: lookup, registration, profile edits, login stamps and
/// email verification.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    verify_url_base: String,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        verify_url_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            verify_url_base: verify_url_base.into(),
        }
    }

    /// Active account by email. Pending accounts are reported as missing.
    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<UserAccount, AccountError> {
        let email = normalize_email(email);
        self.store
            .find_by_email(&email)
            .await?
            .filter(UserAccount::is_visible)
            .ok_or(AccountError::NotFound)
    }

    /// Active account by id. Pending accounts are reported as missing.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<UserAccount, AccountError> {
        self.store
            .find_by_id(id)
            .await?
            .filter(UserAccount::is_visible)
            .ok_or(AccountError::NotFound)
    }

    #[instrument(skip(self, draft), fields(email = %draft.email))]
    pub async fn create(&self, draft: UserCreate) -> Result<UserAccount, AccountError> {
        let email = normalize_email(&draft.email);
        if !is_valid_email(&email) {
            warn!("invalid email");
            return Err(AccountError::InvalidInput(format!("invalid email: {email}")));
        }

        if self.store.find_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AccountError::Conflict("email"));
        }

        let user = self
            .store
            .insert(NewUserAccount {
                email,
                nickname: draft.nickname,
                address: draft.address,
                status: AccountStatus::Pending,
                certification_code: Uuid::new_v4().to_string(),
                last_login_at: None,
            })
            .await?;

        info!(user_id = user.id, "user registered");
        self.dispatch_verification(&user);
        Ok(user)
    }

    /// Sends the verification mail on a detached task. Failures are logged only.
    fn dispatch_verification(&self, user: &UserAccount) {
        let mailer = Arc::clone(&self.mailer);
        let to = user.email.clone();
        let body = verification_body(&self.verify_url_base, user.id, &user.certification_code);
        let user_id = user.id;
        tokio::spawn(
            async move {
                match mailer.send(&to, VERIFICATION_SUBJECT, &body).await {
                    Ok(()) => debug!(user_id, "verification mail sent"),
                    Err(e) => warn!(error = %e, user_id, "verification mail failed"),
                }
            }
            .in_current_span(),
        );
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: UserUpdate) -> Result<UserAccount, AccountError> {
        let user = self.store.update_profile(id, &patch).await?;
        info!(user_id = id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn login(&self, id: i64) -> Result<(), AccountError> {
        let stamp = self
            .store
            .record_login(id, OffsetDateTime::now_utc())
            .await?;
        info!(user_id = id, last_login_at = %stamp, "user logged in");
        Ok(())
    }

    #[instrument(skip(self, code))]
    pub async fn verify_email(&self, id: i64, code: &str) -> Result<(), AccountError> {
        match self.store.activate(id, code).await? {
            Certification::Activated => {
                info!(user_id = id, "email verified");
                Ok(())
            }
            Certification::AlreadyActive => {
                debug!(user_id = id, "email already verified");
                Ok(())
            }
            Certification::Mismatch => {
                warn!(user_id = id, "certification code mismatch");
                Err(AccountError::CertificationMismatch)
            }
        }
    }
}
