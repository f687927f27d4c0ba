pub mod templates;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::SmtpConfig;
pub use templates::{Email, Template};

const SMTP_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, template: &Template) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            sender: config.sender.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, template: &Template) -> Result<(), MailError> {
        let email = template.render();
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient.parse()?)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.plain, email.html))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Used when no SMTP host is configured. Logs that a message was dropped.
/// Bodies carry live tokens, so only the envelope is logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, template: &Template) -> Result<(), MailError> {
        let email = template.render();
        info!(
            recipient,
            template = template.name(),
            subject = %email.subject,
            "mail not sent, no smtp host configured"
        );
        Ok(())
    }
}

pub fn from_config(config: &SmtpConfig) -> Result<Arc<dyn Mailer>, MailError> {
    if config.host.is_empty() {
        return Ok(Arc::new(LogMailer));
    }
    Ok(Arc::new(SmtpMailer::new(config)?))
}

/// Tries up to three times with a short pause in between. Intended to run as a background task.
pub async fn send_with_retry(mailer: Arc<dyn Mailer>, recipient: String, template: Template) {
    for attempt in 1..=SEND_ATTEMPTS {
        match mailer.send(&recipient, &template).await {
            Ok(()) => return,
            Err(err) if attempt < SEND_ATTEMPTS => {
                warn!(attempt, template = template.name(), error = %err, "mail send failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => {
                error!(attempts = attempt, template = template.name(), error = %err, "mail send failed");
            }
        }
    }
}
