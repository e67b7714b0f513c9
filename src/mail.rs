use async_trait::async_trait;
use tracing::{debug, info};

use crate::users::repo_types::User;

/// Outgoing notifications to users.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, user: &User, reset_url: &str) -> anyhow::Result<()>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, user: &User, reset_url: &str) -> anyhow::Result<()> {
        info!(
            user_id = %user.id,
            to = %user.email,
            subject = "Password Reset Request",
            %reset_url,
            "password reset mail"
        );
        debug!(body = %reset_mail_body(reset_url), "password reset mail body");
        Ok(())
    }
}

/// Body of the reset mail.
pub fn reset_mail_body(reset_url: &str) -> String {
    format!(
        "To reset your password, visit the following link:\n{reset_url}\n\n\
         If you did not make this request then simply ignore this email and no changes will be made."
    )
}
