//! SMTP mailer via lettre.
//!
//! Defaults to Gmail over implicit TLS on port 465 and authenticates with an
//! app password. The sender address doubles as the fixed self-recipient.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::{lookup_value, parse_or};
use crate::error::{BackendError, ConfigError};
use crate::mail::{DeliveryReceipt, Mailer, OutgoingMail, Recipient};

const SERVICE: &str = "smtp";

/// SMTP configuration. Credentials are checked per send, not at startup.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub address: Option<String>,
    pub password: Option<SecretString>,
    pub host: String,
    pub port: u16,
}

impl SmtpConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            address: lookup_value(lookup, "GMAIL_ADDRESS"),
            password: lookup_value(lookup, "GMAIL_PASSWORD").map(SecretString::from),
            host: lookup_value(lookup, "SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".into()),
            port: parse_or(lookup, "SMTP_PORT", 465)?,
        })
    }
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn sender(&self) -> Option<&str> {
        self.config.address.as_deref()
    }
}

fn parse_mailbox(raw: &str, role: &str) -> Result<Mailbox, BackendError> {
    raw.parse().map_err(|e| {
        BackendError::request_failed(SERVICE, format!("Invalid {role} address {raw:?}: {e}"))
    })
}

/// Address a mail is actually delivered to.
fn resolve_recipient(sender: &str, to: Recipient) -> String {
    match to {
        Recipient::Myself => sender.to_string(),
        Recipient::Address(addr) => addr,
    }
}

/// Build a plain-text message.
fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, BackendError> {
    Message::builder()
        .from(parse_mailbox(from, "from")?)
        .to(parse_mailbox(to, "to")?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| BackendError::request_failed(SERVICE, format!("Failed to build email: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, BackendError> {
        let address = self
            .config
            .address
            .clone()
            .ok_or_else(|| BackendError::not_configured(SERVICE, "GMAIL_ADDRESS"))?;
        let password = self
            .config
            .password
            .as_ref()
            .ok_or_else(|| BackendError::not_configured(SERVICE, "GMAIL_PASSWORD"))?
            .expose_secret()
            .to_string();

        let to = resolve_recipient(&address, mail.to);
        let email = build_message(&address, &to, &mail.subject, &mail.body)?;

        let host = self.config.host.clone();
        let port = self.config.port;
        let response = tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&host)
                .map_err(|e| {
                    BackendError::request_failed(SERVICE, format!("SMTP relay error: {e}"))
                })?
                .port(port)
                .credentials(Credentials::new(address, password))
                .build();

            transport.send(&email).map_err(|e| {
                BackendError::request_failed(SERVICE, format!("SMTP send failed: {e}"))
            })
        })
        .await
        .map_err(|e| BackendError::request_failed(SERVICE, format!("SMTP task panicked: {e}")))??;

        info!(to = %to, code = %response.code(), "Email sent");
        Ok(DeliveryReceipt {
            detail: format!("Email sent successfully! Server replied {}", response.code()),
            recipient: to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::lookup_from;

    fn config(address: Option<&str>, password: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            address: address.map(String::from),
            password: password.map(SecretString::from),
            // Never reached by these tests.
            host: "127.0.0.1".into(),
            port: 1,
        }
    }

    #[test]
    fn config_defaults_to_gmail_smtps() {
        let config = SmtpConfig::from_lookup(&lookup_from(&[("GMAIL_ADDRESS", "me@example.com")]))
            .unwrap();
        assert_eq!(config.host, "smtp.gmail.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.address.as_deref(), Some("me@example.com"));
        assert!(config.password.is_none());
    }

    #[test]
    fn config_rejects_bad_port() {
        assert!(SmtpConfig::from_lookup(&lookup_from(&[("SMTP_PORT", "smtp")])).is_err());
    }

    #[test]
    fn build_message_sets_headers() {
        let message = build_message(
            "me@example.com",
            "me@example.com",
            "Response for your query: Ping...",
            "link",
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Response for your query: Ping..."));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn recipient_defaults_to_sender() {
        assert_eq!(resolve_recipient("me@example.com", Recipient::Myself), "me@example.com");
        assert_eq!(
            resolve_recipient("me@example.com", Recipient::Address("you@example.com".into())),
            "you@example.com"
        );
    }

    #[test]
    fn sender_is_the_configured_address() {
        let mailer = SmtpMailer::new(config(Some("me@example.com"), None));
        assert_eq!(mailer.sender(), Some("me@example.com"));
        assert_eq!(SmtpMailer::new(config(None, None)).sender(), None);
    }

    #[tokio::test]
    async fn invalid_explicit_recipient_fails_before_connecting() {
        let mailer = SmtpMailer::new(config(Some("me@example.com"), Some("secret")));
        let mail = OutgoingMail::to_address("not an address", "s", "b");
        let err = mailer.send(mail).await.unwrap_err();
        assert!(err.to_string().contains("Invalid to address"));
    }

    #[test]
    fn build_message_rejects_invalid_address() {
        let err = build_message("not an address", "me@example.com", "s", "b").unwrap_err();
        assert!(err.to_string().contains("Invalid from address"));
    }

    #[tokio::test]
    async fn missing_password_is_reported_without_connecting() {
        let mailer = SmtpMailer::new(config(Some("me@example.com"), None));
        let err = mailer.send(OutgoingMail::to_self("s", "b")).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured { .. }));
        assert!(err.to_string().contains("GMAIL_PASSWORD"));
    }

    #[tokio::test]
    async fn missing_address_is_reported_without_connecting() {
        let mailer = SmtpMailer::new(config(None, Some("secret")));
        let err = mailer.send(OutgoingMail::to_self("s", "b")).await.unwrap_err();
        assert!(err.to_string().contains("GMAIL_ADDRESS"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_request_failure() {
        let mailer = SmtpMailer::new(config(Some("me@example.com"), Some("secret")));
        let err = mailer.send(OutgoingMail::to_self("s", "b")).await.unwrap_err();
        assert!(matches!(err, BackendError::RequestFailed { .. }));
    }
}
