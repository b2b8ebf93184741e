//! Values flowing through the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BackendError;

/// A message observed on the source channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Success,
    Error,
}

/// The relay step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStep {
    Generate,
    Publish,
    Deliver,
}

impl RelayStep {
    pub fn label(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Publish => "publish",
            Self::Deliver => "deliver",
        }
    }
}

impl std::fmt::Display for RelayStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one relay run.
///
/// Always complete: success carries a non-empty `reference_url` (absent only
/// for direct generate-and-mail runs), error carries a non-empty `detail` and
/// the failed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResult {
    pub status: RelayStatus,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<RelayStep>,
}

impl RelayResult {
    pub fn success(detail: impl Into<String>, reference_url: Option<String>) -> Self {
        let detail = detail.into();
        Self {
            status: RelayStatus::Success,
            detail: if detail.trim().is_empty() {
                "Relay completed".to_string()
            } else {
                detail
            },
            reference_url,
            failed_step: None,
        }
    }

    pub fn failure(step: RelayStep, error: &BackendError) -> Self {
        Self {
            status: RelayStatus::Error,
            detail: format!("{step} failed: {error}"),
            reference_url: None,
            failed_step: Some(step),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RelayStatus::Success
    }
}
