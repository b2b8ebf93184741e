//! Mail delivery backends.

pub mod smtp;

pub use smtp::{SmtpConfig, SmtpMailer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Who a mail goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// The account's own address.
    Myself,
    Address(String),
}

/// A plain-text mail ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub to: Recipient,
}

impl OutgoingMail {
    /// A mail to the account's own address.
    pub fn to_self(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            to: Recipient::Myself,
        }
    }

    /// A mail to an explicit address.
    pub fn to_address(
        address: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            to: Recipient::Address(address.into()),
        }
    }
}

/// Proof of a successful hand-off to the mail server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Address the mail was delivered to.
    pub recipient: String,
    /// Human-readable confirmation.
    pub detail: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, mail: OutgoingMail) -> Result<DeliveryReceipt, BackendError>;
}
