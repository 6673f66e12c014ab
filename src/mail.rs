use async_trait::async_trait;
use tracing::info;

pub const VERIFICATION_SUBJECT: &str = "Please certify your email address";

/// Outgoing mail port. Implementations decide how a message leaves the process.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Records messages in the log instead of delivering them.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, body_len = body.len(), "mail dispatched");
        Ok(())
    }
}

pub fn verification_link(base: &str, user_id: i64, code: &str) -> String {
    format!(
        "{}/api/users/{}/verify?certificationCode={}",
        base.trim_end_matches('/'),
        user_id,
        code
    )
}

pub fn verification_body(base: &str, user_id: i64, code: &str) -> String {
    format!(
        "Please click the following link to certify your email address: {}",
        verification_link(base, user_id, code)
    )
}
