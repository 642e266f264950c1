//! Outbound email delivery.
//!
//! Flows hand a rendered [`EmailMessage`] to an [`EmailSender`]. The default
//! sender for local dev is [`LogEmailSender`], which logs and returns `Ok(())`;
//! [`SmtpEmailSender`] relays over STARTTLS when SMTP is configured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, Instrument};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub html_body: String,
}

/// Email delivery abstraction used by the verification flow.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the envelope instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// # Errors
    /// Returns an error if the relay host or the sender address is invalid.
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        password: &SecretString,
        from: &str,
    ) -> Result<Self> {
        let from: Mailbox = from
            .parse()
            .with_context(|| format!("invalid sender address: {from}"))?;
        let credentials = Credentials::new(user.to_string(), password.expose_secret().to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP relay: {host}"))?
            .port(port)
            .credentials(credentials)
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let to: Mailbox = message
            .to_email
            .parse()
            .with_context(|| format!("invalid recipient: {}", message.to_email))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .context("failed to build email")?;

        let span = tracing::info_span!("smtp.send", to_email = %message.to_email);
        self.transport
            .send(email)
            .instrument(span)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Render the verification email for a freshly issued code.
#[must_use]
pub fn verification_email(app_name: &str, to_email: &str, username: &str, code: &str) -> EmailMessage {
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif;">
    <h2>{app_name}</h2>
    <p>Hello {username},</p>
    <p>Your verification code is:</p>
    <p style="font-size: 24px; font-weight: bold; letter-spacing: 4px;">{code}</p>
    <p>The code expires in 15 minutes. If you did not request it, ignore this email.</p>
  </body>
</html>
"#
    );
    EmailMessage {
        to_email: to_email.to_string(),
        subject: format!("{app_name} Email Verification"),
        html_body,
    }
}
