//! Generate -> publish -> deliver.
//!
//! Each step runs only after the previous one succeeded. The first failure
//! ends the run and is reported in the returned [`RelayResult`]; nothing is
//! retried.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::BackendError;
use crate::llm::TextGenerator;
use crate::mail::{Mailer, OutgoingMail, Recipient};
use crate::relay::types::{RelayResult, RelayStep};
use crate::storage::DocumentStore;

/// Characters of the prompt carried into subjects and document titles.
const PREVIEW_CHARS: usize = 30;

/// Subject used by [`generate_and_deliver`] when none is given.
pub const DEFAULT_SUBJECT: &str = "AI Generated Content";

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Subject line of the relay notification mail.
pub fn subject_for(text: &str) -> String {
    format!("Response for your query: {}...", preview(text))
}

fn title_for(text: &str) -> String {
    format!("Response: {}", preview(text))
}

fn body_for(url: &str) -> String {
    format!("Here is the link to the Google Sheet with the answer:\n{url}")
}

/// Runs one message through the three backends.
#[derive(Clone)]
pub struct RelayPipeline {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn DocumentStore>,
    mailer: Arc<dyn Mailer>,
}

impl RelayPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn DocumentStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            generator,
            store,
            mailer,
        }
    }

    /// Relay one message. Never panics and never returns a partial result.
    pub async fn relay(&self, text: &str) -> RelayResult {
        match self.run(text).await {
            Ok(result) => result,
            Err((step, err)) => {
                error!(step = %step, error = %err, "Relay failed");
                RelayResult::failure(step, &err)
            }
        }
    }

    async fn run(&self, text: &str) -> Result<RelayResult, (RelayStep, BackendError)> {
        let answer = self
            .generator
            .generate(text)
            .await
            .map_err(|e| (RelayStep::Generate, e))?;
        info!(
            generator = self.generator.name(),
            chars = answer.chars().count(),
            "Answer generated"
        );

        let doc = self
            .store
            .create_document(&title_for(text), &answer)
            .await
            .map_err(|e| (RelayStep::Publish, e))?;
        self.store
            .set_public_readable(&doc.id)
            .await
            .map_err(|e| (RelayStep::Publish, e))?;
        if doc.url.trim().is_empty() {
            return Err((
                RelayStep::Publish,
                BackendError::invalid_response(self.store.name(), "document has no URL"),
            ));
        }
        info!(store = self.store.name(), url = %doc.url, "Answer published");

        let receipt = self
            .mailer
            .send(OutgoingMail::to_self(subject_for(text), body_for(&doc.url)))
            .await
            .map_err(|e| (RelayStep::Deliver, e))?;
        info!(mailer = self.mailer.name(), to = %receipt.recipient, "Link delivered");

        Ok(RelayResult::success(receipt.detail, Some(doc.url)))
    }
}

/// Generate text for `prompt` and mail it to the account itself, without a
/// document.
///
/// Returns the generated text (if generation succeeded) alongside the result.
pub async fn generate_and_deliver(
    generator: &dyn TextGenerator,
    mailer: &dyn Mailer,
    prompt: &str,
    subject: Option<&str>,
) -> (Option<String>, RelayResult) {
    generate_and_deliver_to(generator, mailer, prompt, subject, Recipient::Myself).await
}

/// Like [`generate_and_deliver`], to any recipient.
pub async fn generate_and_deliver_to(
    generator: &dyn TextGenerator,
    mailer: &dyn Mailer,
    prompt: &str,
    subject: Option<&str>,
    to: Recipient,
) -> (Option<String>, RelayResult) {
    let answer = match generator.generate(prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, "Generation failed");
            return (None, RelayResult::failure(RelayStep::Generate, &e));
        }
    };

    let mail = OutgoingMail {
        subject: subject.unwrap_or(DEFAULT_SUBJECT).to_string(),
        body: answer.clone(),
        to,
    };
    match mailer.send(mail).await {
        Ok(receipt) => (Some(answer), RelayResult::success(receipt.detail, None)),
        Err(e) => {
            error!(error = %e, "Delivery failed");
            (Some(answer), RelayResult::failure(RelayStep::Deliver, &e))
        }
    }
}
