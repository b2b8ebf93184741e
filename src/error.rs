//! Error types for the relay.

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure of a third-party service call (generation, storage, mail).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{service} is not configured: {source}")]
    NotConfigured {
        service: String,
        #[source]
        source: ConfigError,
    },

    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{service} returned HTTP {status}: {body}")]
    HttpStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },
}

impl BackendError {
    pub fn not_configured(service: &str, key: &str) -> Self {
        Self::NotConfigured {
            service: service.to_string(),
            source: ConfigError::MissingEnvVar(key.to_string()),
        }
    }

    pub fn request_failed(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Name of the service that failed.
    pub fn service(&self) -> &str {
        match self {
            Self::NotConfigured { service, .. }
            | Self::RequestFailed { service, .. }
            | Self::HttpStatus { service, .. }
            | Self::InvalidResponse { service, .. } => service,
        }
    }
}

/// Source channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(String),
}
