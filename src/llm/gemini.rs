//! Gemini client: `generateContent` over plain HTTPS.
//!
//! The API key travels as the `key` query parameter. Response text lives at
//! `candidates[0].content.parts[*].text`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::lookup_value;
use crate::error::{BackendError, ConfigError};
use crate::llm::TextGenerator;

const SERVICE: &str = "gemini";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Error bodies longer than this are cut before landing in logs.
const MAX_ERROR_BODY: usize = 500;

/// Gemini configuration. The key is optional here: without it every
/// `generate` call fails with `NotConfigured`.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub api_base: String,
}

impl GeminiConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let api_key = lookup_value(lookup, "GEMINI_API_KEY")
            .or_else(|| lookup_value(lookup, "GOOGLE_API_KEY"))
            .map(SecretString::from);

        Ok(Self {
            api_key,
            model: lookup_value(lookup, "GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_base: lookup_value(lookup, "GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
        })
    }

    /// Fail unless a key is present. Used where generation is mandatory.
    pub fn require_key(&self) -> Result<(), ConfigError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(ConfigError::MissingRequired {
                key: "GEMINI_API_KEY".into(),
                hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY) to a Google AI Studio key.".into(),
            }),
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ── Client ──────────────────────────────────────────────────────────

pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        info!(model = %config.model, configured = config.api_key.is_some(), "Gemini client ready");
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| BackendError::not_configured(SERVICE, "GEMINI_API_KEY"))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Calling Gemini");

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::request_failed(SERVICE, e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                service: SERVICE.into(),
                status: status.as_u16(),
                body: error_message(&raw),
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(SERVICE, e.without_url()))?;

        extract_text(body)
    }
}

fn extract_text(body: GenerateResponse) -> Result<String, BackendError> {
    let candidate = body
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::invalid_response(SERVICE, "no candidates returned"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(BackendError::invalid_response(
            SERVICE,
            format!("empty text (finish reason: {reason})"),
        ));
    }

    Ok(text)
}

/// Prefer the structured `error.message`, else the raw body, cut short.
fn error_message(raw: &str) -> String {
    let message = serde_json::from_str::<ApiErrorBody>(raw)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| raw.to_string());
    message.chars().take(MAX_ERROR_BODY).collect()
}
