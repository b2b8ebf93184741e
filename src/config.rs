//! Configuration types.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file by the binaries). Each config type has a `from_lookup`
//! constructor taking a key → value function so tests never touch the
//! process environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::channels::telegram::TelegramConfig;
use crate::error::ConfigError;
use crate::llm::gemini::GeminiConfig;
use crate::mail::smtp::SmtpConfig;
use crate::storage::sheets::SheetsConfig;

/// Read a process environment variable.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Fetch a non-blank value.
pub(crate) fn lookup_value<L>(lookup: &L, key: &str) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fetch a value that must be present.
pub(crate) fn required<L>(lookup: &L, key: &str, hint: &str) -> Result<String, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    lookup_value(lookup, key).ok_or_else(|| ConfigError::MissingRequired {
        key: key.to_string(),
        hint: hint.to_string(),
    })
}

/// Parse an optional value, falling back to `default` when unset.
pub(crate) fn parse_or<L, T>(lookup: &L, key: &str, default: T) -> Result<T, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup_value(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// HTTP server and in-process queue settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the event stream server binds to.
    pub bind_addr: SocketAddr,
    /// Keep-alive interval on `/events`; also bounds disconnect detection.
    pub keep_alive: Duration,
    /// Per-subscriber buffer of the broadcast queue.
    pub broadcast_capacity: usize,
    /// Number of relay outcomes retained for `/relays`.
    pub history_capacity: usize,
    /// Delay before the listener re-subscribes after its stream ends.
    pub restart_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            keep_alive: Duration::from_secs(15),
            broadcast_capacity: 256,
            history_capacity: 100,
            restart_delay: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let keep_alive_secs: u64 =
            parse_or(&lookup, "RELAY_KEEP_ALIVE_SECS", defaults.keep_alive.as_secs())?;
        if keep_alive_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_KEEP_ALIVE_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        let broadcast_capacity: usize =
            parse_or(&lookup, "RELAY_BROADCAST_CAPACITY", defaults.broadcast_capacity)?;
        if broadcast_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_BROADCAST_CAPACITY".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "RELAY_HTTP_ADDR", defaults.bind_addr)?,
            keep_alive: Duration::from_secs(keep_alive_secs),
            broadcast_capacity,
            history_capacity: parse_or(
                &lookup,
                "RELAY_HISTORY_CAPACITY",
                defaults.history_capacity,
            )?,
            restart_delay: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_RESTART_DELAY_SECS",
                defaults.restart_delay.as_secs(),
            )?),
        })
    }
}

/// Full configuration of the relay service.
///
/// The Telegram settings are mandatory and fail startup when absent. The
/// backend settings are per-operation: a missing credential only fails the
/// relay step that needs it.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub telegram: TelegramConfig,
    pub gemini: GeminiConfig,
    pub sheets: SheetsConfig,
    pub smtp: SmtpConfig,
    pub server: ServerConfig,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            telegram: TelegramConfig::from_lookup(&lookup)?,
            gemini: GeminiConfig::from_lookup(&lookup)?,
            sheets: SheetsConfig::from_lookup(&lookup)?,
            smtp: SmtpConfig::from_lookup(&lookup)?,
            server: ServerConfig::from_lookup(&lookup)?,
        })
    }
}
