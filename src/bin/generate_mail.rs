//! One-shot: generate text for a prompt and mail it.
//!
//! Usage: `generate-mail [--to ADDRESS] [--subject TEXT] [PROMPT...]`

use clap::Parser;
use tracing::info;

use telegram_relay::config::env_lookup;
use telegram_relay::llm::{GeminiClient, GeminiConfig};
use telegram_relay::mail::{Recipient, SmtpConfig, SmtpMailer};
use telegram_relay::relay::{
    DEFAULT_SUBJECT, RelayStatus, generate_and_deliver, generate_and_deliver_to,
};
use telegram_relay::telemetry;

const DEFAULT_PROMPT: &str = "Explain how AI works in a few words";

#[derive(Parser, Debug)]
#[command(version, about = "Generate text with Gemini and email it", long_about = None)]
struct Args {
    /// Recipient address. Defaults to GMAIL_ADDRESS itself.
    #[arg(long)]
    to: Option<String>,

    /// Mail subject
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,

    /// Prompt words, joined with spaces
    prompt: Vec<String>,
}

impl Args {
    fn prompt(&self) -> String {
        if self.prompt.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            self.prompt.join(" ")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _ = dotenvy::dotenv();
    telemetry::init();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let gemini = GeminiConfig::from_lookup(&env_lookup)?;
    if let Err(e) = gemini.require_key() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let generator = GeminiClient::new(gemini);
    let mailer = SmtpMailer::new(SmtpConfig::from_lookup(&env_lookup)?);
    let prompt = args.prompt();
    info!(
        model = generator.model(),
        to = args.to.as_deref().or(mailer.sender()).unwrap_or("(unset)"),
        prompt = %prompt,
        "Generating"
    );

    let subject = Some(args.subject.as_str());
    let (text, result) = match args.to {
        Some(address) => {
            let to = Recipient::Address(address);
            generate_and_deliver_to(&generator, &mailer, &prompt, subject, to).await
        }
        None => generate_and_deliver(&generator, &mailer, &prompt, subject).await,
    };

    if let Some(text) = text {
        println!("{text}");
    }
    match result.status {
        RelayStatus::Success => {
            eprintln!("{}", result.detail);
            Ok(())
        }
        RelayStatus::Error => {
            eprintln!("Error: {}", result.detail);
            std::process::exit(1);
        }
    }
}
