//! Listener: turns channel posts into broadcasts and relay runs.
//!
//! For every inbound post the listener first publishes the message to stream
//! subscribers and then starts a relay run in its own task, so a slow backend
//! never holds up the stream or the next post.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::channels::{Channel, IncomingMessage};
use crate::events::MessageBroadcaster;
use crate::relay::{Message, RelayHistory, RelayPipeline, RelayResult};

pub struct Listener {
    channel: Arc<dyn Channel>,
    broadcaster: MessageBroadcaster,
    pipeline: RelayPipeline,
    history: RelayHistory,
    restart_delay: Duration,
}

impl Listener {
    pub fn new(
        channel: Arc<dyn Channel>,
        broadcaster: MessageBroadcaster,
        pipeline: RelayPipeline,
        history: RelayHistory,
        restart_delay: Duration,
    ) -> Self {
        Self {
            channel,
            broadcaster,
            pipeline,
            history,
            restart_delay,
        }
    }

    /// Handle one inbound post.
    ///
    /// Returns the spawned relay task, or `None` when the post carried no text.
    pub fn handle(&self, incoming: IncomingMessage) -> Option<JoinHandle<RelayResult>> {
        if incoming.content.trim().is_empty() {
            warn!(
                channel = %incoming.channel,
                chat = %incoming.chat,
                "Dropping post without text"
            );
            return None;
        }

        let message = Message {
            id: incoming.id,
            text: incoming.content,
            received_at: incoming.received_at,
        };
        info!(
            message_id = %message.id,
            chat = %incoming.chat,
            chars = message.text.chars().count(),
            metadata = %incoming.metadata,
            "New post received"
        );

        self.broadcaster.publish(message.clone());

        let pipeline = self.pipeline.clone();
        let history = self.history.clone();
        Some(tokio::spawn(async move {
            let result = pipeline.relay(&message.text).await;
            if result.is_success() {
                info!(message_id = %message.id, detail = %result.detail, "Relay succeeded");
            }
            history.record(message.id, &message.text, result.clone()).await;
            result
        }))
    }

    /// Consume the channel forever, reopening it whenever it ends or fails.
    pub async fn run(&self) {
        loop {
            match self.channel.start().await {
                Ok(mut stream) => {
                    info!(channel = self.channel.name(), "Listening for posts");
                    while let Some(incoming) = stream.next().await {
                        self.handle(incoming);
                    }
                    warn!(channel = self.channel.name(), "Channel stream ended");
                }
                Err(e) => {
                    error!(channel = self.channel.name(), error = %e, "Failed to start channel");
                }
            }
            info!(
                delay_secs = self.restart_delay.as_secs_f64(),
                "Restarting channel subscription"
            );
            tokio::time::sleep(self.restart_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::channels::MessageStream;
    use crate::error::ChannelError;
    use crate::llm::{GeminiClient, GeminiConfig};
    use crate::mail::{SmtpConfig, SmtpMailer};
    use crate::relay::RelayStep;
    use crate::storage::{GoogleSheetsStore, SheetsConfig};

    /// Backends without credentials: every relay stops at the generate step.
    fn unconfigured_pipeline() -> RelayPipeline {
        RelayPipeline::new(
            Arc::new(GeminiClient::new(GeminiConfig {
                api_key: None,
                model: "gemini-2.5-flash".into(),
                api_base: "http://127.0.0.1:1".into(),
            })),
            Arc::new(GoogleSheetsStore::new(SheetsConfig {
                access_token: None,
                sheets_api_base: "http://127.0.0.1:1".into(),
                drive_api_base: "http://127.0.0.1:1".into(),
            })),
            Arc::new(SmtpMailer::new(SmtpConfig {
                address: None,
                password: None,
                host: "127.0.0.1".into(),
                port: 1,
            })),
        )
    }

    /// First start fails, later starts yield the fixed posts and end.
    struct FlakyChannel {
        starts: AtomicUsize,
        posts: Vec<&'static str>,
    }

    #[async_trait]
    impl Channel for FlakyChannel {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            if self.starts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ChannelError::StartupFailed {
                    name: "flaky".into(),
                    reason: "network down".into(),
                });
            }
            let posts: Vec<IncomingMessage> = self
                .posts
                .iter()
                .map(|text| IncomingMessage::new("flaky", "@chan", *text))
                .collect();
            Ok(Box::pin(futures::stream::iter(posts)))
        }
    }

    fn listener(channel: Arc<dyn Channel>, broadcaster: MessageBroadcaster) -> Listener {
        Listener::new(
            channel,
            broadcaster,
            unconfigured_pipeline(),
            RelayHistory::new(10),
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn handle_broadcasts_then_relays() {
        let broadcaster = MessageBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let channel = Arc::new(FlakyChannel {
            starts: AtomicUsize::new(0),
            posts: vec![],
        });
        let listener = listener(channel, broadcaster);

        let handle = listener
            .handle(IncomingMessage::new("flaky", "@chan", "Ping"))
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().text, "Ping");
        let result = handle.await.unwrap();
        assert_eq!(result.failed_step, Some(RelayStep::Generate));
        assert!(result.detail.contains("GEMINI_API_KEY"));

        let recorded = listener.history.recent().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].preview, "Ping");
    }

    #[tokio::test]
    async fn blank_posts_are_dropped() {
        let broadcaster = MessageBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let channel = Arc::new(FlakyChannel {
            starts: AtomicUsize::new(0),
            posts: vec![],
        });
        let listener = listener(channel, broadcaster);

        assert!(listener.handle(IncomingMessage::new("flaky", "@chan", "  \n")).is_none());
        assert!(rx.try_recv().is_err());
        assert!(listener.history.is_empty().await);
    }

    #[tokio::test]
    async fn run_survives_start_failure_and_stream_end() {
        let broadcaster = MessageBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();
        let channel = Arc::new(FlakyChannel {
            starts: AtomicUsize::new(0),
            posts: vec!["one", "two"],
        });
        let listener = listener(channel.clone(), broadcaster);
        let task = tokio::spawn(async move { listener.run().await });

        // Failed start, then two full passes over the posts.
        let expected = ["one", "two", "one", "two"];
        for text in expected {
            let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("test timed out")
                .unwrap();
            assert_eq!(message.text, text);
        }
        assert!(channel.starts.load(Ordering::SeqCst) >= 3);

        task.abort();
    }
}
