use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::AppError;

/// Credentials sent to a learner whose enrollment was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentAcceptedMail {
    pub to: String,
    pub name: String,
    pub username: String,
    pub password: String,
}

impl EnrollmentAcceptedMail {
    pub const SUBJECT: &'static str = "Your enrollment has been accepted";

    pub fn body(&self) -> String {
        format!(
            "Hello {},\n\nYour enrollment has been accepted. You can now log in to the portal.\n\nUsername: {}\nPassword: {}\n\nPlease change your password after your first login.\n",
            self.name, self.username, self.password
        )
    }
}

#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_enrollment_accepted(&self, mail: &EnrollmentAcceptedMail) -> Result<(), AppError>;
}

/// Transport that only writes an entry to the log.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[rocket::async_trait]
impl Mailer for LogMailer {
    #[instrument(skip(self, mail), fields(to = %mail.to))]
    async fn send_enrollment_accepted(&self, mail: &EnrollmentAcceptedMail) -> Result<(), AppError> {
        info!(
            from = %self.from,
            to = %mail.to,
            subject = EnrollmentAcceptedMail::SUBJECT,
            "Enrollment accepted mail queued for delivery"
        );
        Ok(())
    }
}

/// Managed-state handle so the transport can be swapped at launch.
#[derive(Clone)]
pub struct MailerHandle(pub Arc<dyn Mailer>);

impl MailerHandle {
    pub fn new(mailer: impl Mailer + 'static) -> Self {
        Self(Arc::new(mailer))
    }
}

impl std::ops::Deref for MailerHandle {
    type Target = dyn Mailer;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
