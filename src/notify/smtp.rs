//! SMTP delivery of alerts through `lettre`.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use super::Notifier;
use crate::config::NotifyConfig;
use crate::error::{Result, ScanError};

/// Environment variable read when no password is configured
pub const PASSWORD_ENV: &str = "SMTP_PASSWORD";

/// Sends alerts through an SMTP relay (STARTTLS)
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| ScanError::Notify(format!("Invalid address {}: {}", address, e)))
}

impl SmtpNotifier {
    /// Build a notifier from configuration
    ///
    /// # Returns
    ///
    /// `None` when notifications are disabled or no SMTP host is set.
    ///
    /// # Errors
    ///
    /// Returns error if an address does not parse or the relay cannot be set up.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>> {
        if !config.enabled {
            info!("Email notifications disabled");
            return Ok(None);
        }
        if config.smtp_host.is_empty() {
            warn!("No SMTP host configured, email notifications skipped");
            return Ok(None);
        }

        let from = parse_mailbox(&config.from)?;
        let to = config
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>>>()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| ScanError::Notify(format!("SMTP relay {}: {}", config.smtp_host, e)))?
            .port(config.smtp_port);

        let password = config
            .smtp_password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok());
        if let (Some(user), Some(password)) = (&config.smtp_user, password) {
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
            to,
        }))
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(body.to_string())
            .map_err(|e| ScanError::Notify(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.message(subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| ScanError::Notify(format!("SMTP delivery failed: {}", e)))?;
        info!("Sent \"{}\" to {} recipients", subject, self.to.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotifyConfig {
        NotifyConfig {
            smtp_host: "smtp.example.com".to_string(),
            from: "scanner@example.com".to_string(),
            to: vec!["ops@example.com".to_string(), "Field Team <field@example.com>".to_string()],
            ..NotifyConfig::default()
        }
    }

    #[test]
    fn test_disabled_returns_none() {
        let mut config = config();
        config.enabled = false;
        assert!(SmtpNotifier::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_missing_host_returns_none() {
        let mut config = config();
        config.smtp_host = String::new();
        assert!(SmtpNotifier::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_invalid_recipient() {
        let mut config = config();
        config.to.push("not-an-email".to_string());
        match SmtpNotifier::from_config(&config) {
            Err(ScanError::Notify(msg)) => assert!(msg.contains("not-an-email")),
            other => panic!("Expected Notify error, got: {:?}", other),
        }
    }

    #[test]
    fn test_message_has_all_recipients() {
        let notifier = SmtpNotifier::from_config(&config()).unwrap().unwrap();
        let message = notifier
            .message("List of FET failures for the site s file f.csv", "line 1\nline 2")
            .unwrap();

        assert_eq!(message.envelope().to().len(), 2);
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Subject: List of FET failures for the site s file f.csv"));
        assert!(formatted.contains("line 1\r\nline 2") || formatted.contains("line 1\nline 2"));
    }
}
