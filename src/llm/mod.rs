//! Text generation backends.
//!
//! The relay treats generation as a black box: prompt in, text out. The
//! `TextGenerator` trait is that boundary; `GeminiClient` is the production
//! implementation.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

use async_trait::async_trait;

use crate::error::BackendError;

/// A generative-text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Generate text for a prompt.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}
