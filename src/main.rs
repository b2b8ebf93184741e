use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use telegram_relay::channels::{Channel, TelegramChannel};
use telegram_relay::config::RelayConfig;
use telegram_relay::events::{EVENTS_PATH, EventsState, MessageBroadcaster, event_routes};
use telegram_relay::listener::Listener;
use telegram_relay::llm::GeminiClient;
use telegram_relay::mail::SmtpMailer;
use telegram_relay::relay::{RelayHistory, RelayPipeline};
use telegram_relay::storage::GoogleSheetsStore;
use telegram_relay::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the real environment still applies.
    let _ = dotenvy::dotenv();
    telemetry::init();

    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let config = RelayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let server = config.server.clone();

    // Missing backend credentials only fail the affected relay step.
    if let Err(e) = config.gemini.require_key() {
        warn!(error = %e, "Relays will fail at the generate step");
    }
    if config.sheets.access_token.is_none() {
        warn!("GOOGLE_ACCESS_TOKEN not set, relays will fail at the publish step");
    }
    if config.smtp.address.is_none() || config.smtp.password.is_none() {
        warn!("GMAIL_ADDRESS/GMAIL_PASSWORD not set, relays will fail at the deliver step");
    }

    // ── Backends ────────────────────────────────────────────────────────
    let generator = GeminiClient::new(config.gemini);
    let telegram =
        TelegramChannel::new(config.telegram).context("Failed to create Telegram channel")?;

    eprintln!("📡 Telegram Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {}", telegram.target());
    eprintln!("   Model: {}", generator.model());
    eprintln!("   Events: http://{}{}", server.bind_addr, EVENTS_PATH);

    let pipeline = RelayPipeline::new(
        Arc::new(generator),
        Arc::new(GoogleSheetsStore::new(config.sheets)),
        Arc::new(SmtpMailer::new(config.smtp)),
    );

    let channel: Arc<dyn Channel> = Arc::new(telegram);
    if let Err(e) = channel.health_check().await {
        warn!(error = %e, "Telegram health check failed, polling anyway");
    }

    // ── Event stream server ─────────────────────────────────────────────
    let broadcaster = MessageBroadcaster::new(server.broadcast_capacity);
    let history = RelayHistory::new(server.history_capacity);

    let app = event_routes(EventsState {
        broadcaster: broadcaster.clone(),
        history: history.clone(),
        keep_alive: server.keep_alive,
    });
    let tcp = tokio::net::TcpListener::bind(server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", server.bind_addr))?;
    let bind_addr = server.bind_addr;
    let server_handle = tokio::spawn(async move {
        info!(addr = %bind_addr, "Event stream server started");
        if let Err(e) = axum::serve(tcp, app).await {
            warn!(error = %e, "Event stream server stopped");
        }
    });

    // ── Listener ────────────────────────────────────────────────────────
    let listener = Listener::new(
        channel.clone(),
        broadcaster,
        pipeline,
        history,
        server.restart_delay,
    );

    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down...");
        }
        _ = listener.run() => {}
    }

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "Channel shutdown failed");
    }
    // Open SSE streams never finish on their own.
    server_handle.abort();

    Ok(())
}
