//! Telegram relay: mirrors channel posts to an SSE stream and relays each one
//! through Gemini, Google Sheets and email.

pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod listener;
pub mod llm;
pub mod mail;
pub mod relay;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test_support;
