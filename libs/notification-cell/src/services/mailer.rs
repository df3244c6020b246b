use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{EmailMessage, NotificationError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Delivers mail through an authenticated STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, NotificationError> {
        let from = config
            .email_from
            .parse::<Mailbox>()
            .map_err(|e| {
                NotificationError::InvalidAddress(format!("{}: {}", config.email_from, e))
            })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotificationError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }

    fn build(&self, message: &EmailMessage) -> Result<Message, NotificationError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress(format!("{}: {}", message.to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone());

        let email = match &message.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.text_body.clone()),
        };

        email.map_err(|e| NotificationError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let email = self.build(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        info!(to = %message.to, subject = %message.subject, "e-mail sent");
        Ok(())
    }
}

/// Development mailer: writes the message to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        warn!(
            to = %message.to,
            subject = %message.subject,
            "[DEV MODE] e-mail not sent, SMTP is not configured\n{}",
            message.text_body
        );
        Ok(())
    }
}

/// SMTP when configured, the log mailer otherwise.
pub fn mailer_from_config(config: &AppConfig) -> Arc<dyn Mailer> {
    if !config.is_email_configured() {
        return Arc::new(LogMailer);
    }

    match SmtpMailer::from_config(config) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "SMTP mailer could not be built, falling back to log mailer");
            Arc::new(LogMailer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_mailer_always_succeeds() {
        let message = EmailMessage {
            to: "ana@example.com".to_string(),
            subject: "Hola".to_string(),
            text_body: "cuerpo".to_string(),
            html_body: None,
        };
        assert!(tokio_test::block_on(LogMailer.send(&message)).is_ok());
    }
}
