//! Document storage backends: content in, shareable URL out.

pub mod sheets;

pub use sheets::{GoogleSheetsStore, SheetsConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub url: String,
}

/// A backend that stores generated content and hands out links to it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// Create a document titled `title` holding `content`.
    async fn create_document(&self, title: &str, content: &str)
    -> Result<StoredDocument, BackendError>;

    /// Let anyone with the link read the document.
    async fn set_public_readable(&self, id: &str) -> Result<(), BackendError>;
}
