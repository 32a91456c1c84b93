//! Reminder emails over SMTP.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use habitgrid_common::{AppError, AppResult, config::EmailSettings};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};

/// Email message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient email address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text_body: String,
    /// HTML body
    pub html_body: String,
}

/// Something that can deliver an email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> AppResult<()>;
}

/// [`EmailSender`] relaying through an SMTP server.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Build the transport from settings. No connection is made yet.
    pub fn new(settings: &EmailSettings) -> AppResult<Self> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
        }
        .map_err(|e| AppError::Config(format!("Invalid SMTP host: {e}")))?;

        let mut builder = builder.port(settings.smtp_port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = format!("{} <{}>", settings.from_name, settings.from_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Validation(format!("Invalid recipient: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .multipart(MultiPart::alternative_plain_html(
                message.text_body,
                message.html_body,
            ))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {e}")))?;
        Ok(())
    }
}

/// Email service. Sending is a no-op when no sender is configured.
#[derive(Clone, Default)]
pub struct EmailService {
    sender: Option<Arc<dyn EmailSender>>,
    app_url: String,
}

impl EmailService {
    /// Create a new email service.
    #[must_use]
    pub fn new(sender: Option<Arc<dyn EmailSender>>, app_url: String) -> Self {
        Self { sender, app_url }
    }

    /// Check if email service is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Remind a user that nothing is logged for `date` yet.
    ///
    /// Returns whether an email was handed to the relay.
    pub async fn send_reminder(
        &self,
        to: &str,
        username: &str,
        date: NaiveDate,
    ) -> AppResult<bool> {
        let Some(ref sender) = self.sender else {
            return Ok(false);
        };
        sender.send(render_reminder(&self.app_url, to, username, date)).await?;
        tracing::debug!(username = %username, %date, "Reminder email sent");
        Ok(true)
    }
}

/// Render the reminder email.
#[must_use]
pub fn render_reminder(app_url: &str, to: &str, username: &str, date: NaiveDate) -> EmailMessage {
    let link = format!("{}/days/{date}", app_url.trim_end_matches('/'));
    EmailMessage {
        to: to.to_string(),
        subject: format!("Log your day, @{username}"),
        text_body: format!(
            "Hi @{username},\n\nYou have not logged anything for {date} yet. \
             Keep your streak going:\n{link}\n\n\
             You can turn these reminders off in your settings."
        ),
        html_body: format!(
            "<!DOCTYPE html><html><body style=\"font-family:sans-serif;\">\
             <p>Hi @{username},</p>\
             <p>You have not logged anything for <strong>{date}</strong> yet. \
             Keep your streak going.</p>\
             <p><a href=\"{link}\">Log your day</a></p>\
             <p><small>You can turn these reminders off in your settings.</small></p>\
             </body></html>"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: EmailMessage) -> AppResult<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_render_reminder() {
        let message = render_reminder("https://habitgrid.example/", "a@example.com", "alice", date());
        assert_eq!(message.to, "a@example.com");
        assert!(message.subject.contains("@alice"));
        assert!(message.text_body.contains("2024-06-01"));
        assert!(message.html_body.contains("https://habitgrid.example/days/2024-06-01"));
    }

    #[tokio::test]
    async fn test_disabled_service_sends_nothing() {
        let service = EmailService::default();
        assert!(!service.is_enabled());
        assert!(!service.send_reminder("a@example.com", "alice", date()).await.unwrap());
    }

    #[tokio::test]
    async fn test_send_reminder() {
        let sender = Arc::new(RecordingSender::default());
        let service = EmailService::new(Some(sender.clone()), "https://habitgrid.example".to_string());
        assert!(service.send_reminder("a@example.com", "alice", date()).await.unwrap());
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_smtp_sender_rejects_bad_from() {
        let settings = EmailSettings {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from_address: "not an address".to_string(),
            from_name: "habitgrid".to_string(),
            starttls: true,
        };
        assert!(matches!(SmtpEmailSender::new(&settings), Err(AppError::Config(_))));
    }
}
