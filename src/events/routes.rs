//! HTTP surface: service descriptor, the SSE stream, health and relay history.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::broadcast::MessageBroadcaster;
use crate::relay::{Message, RelayHistory};

pub const EVENTS_PATH: &str = "/events";

/// State shared across handlers.
#[derive(Clone)]
pub struct EventsState {
    pub broadcaster: MessageBroadcaster,
    pub history: RelayHistory,
    /// Interval between keep-alive comments on idle streams.
    pub keep_alive: Duration,
}

/// Build the router with the stream and status routes.
pub fn event_routes(state: EventsState) -> Router {
    Router::new()
        .route("/", get(index))
        .route(EVENTS_PATH, get(events))
        .route("/health", get(health))
        .route("/relays", get(relays))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Telegram SSE server is running.",
        "sse_endpoint": EVENTS_PATH,
    }))
}

async fn health(State(state): State<EventsState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "subscribers": state.broadcaster.subscriber_count(),
    }))
}

async fn relays(State(state): State<EventsState>) -> impl IntoResponse {
    Json(state.history.recent().await)
}

/// Logs when the serving stream is dropped, i.e. the client went away.
struct Subscription;

impl Drop for Subscription {
    fn drop(&mut self) {
        info!("Stream client disconnected");
    }
}

/// One SSE event per message. Line breaks become separate `data:` lines.
fn message_event(message: &Message) -> Event {
    let text = message.text.replace("\r\n", "\n").replace('\r', "\n");
    Event::default().data(text)
}

async fn events(
    State(state): State<EventsState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    info!(
        subscribers = state.broadcaster.subscriber_count(),
        "Stream client connected"
    );

    let subscription = Subscription;
    let stream = BroadcastStream::new(rx).filter_map(move |item| {
        let _ = &subscription;
        match item {
            Ok(message) => Some(Ok(message_event(&message))),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Stream client lagged behind broadcast");
                None
            }
        }
    });

    // Each keep-alive write also surfaces a dead connection.
    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::relay::RelayResult;

    fn state() -> EventsState {
        EventsState {
            broadcaster: MessageBroadcaster::new(16),
            history: RelayHistory::new(10),
            keep_alive: Duration::from_secs(15),
        }
    }

    async fn get_json(app: Router, uri: &str) -> Value {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_describes_stream_endpoint() {
        let body = get_json(event_routes(state()), "/").await;
        assert_eq!(body["sse_endpoint"], "/events");
        assert_eq!(body["message"], "Telegram SSE server is running.");
    }

    #[tokio::test]
    async fn health_reports_subscribers() {
        let state = state();
        let _rx = state.broadcaster.subscribe();
        let body = get_json(event_routes(state), "/health").await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subscribers"], 1);
    }

    #[tokio::test]
    async fn relays_lists_history() {
        let state = state();
        state
            .history
            .record(
                Uuid::new_v4(),
                "Ping",
                RelayResult::success("sent", Some("https://doc".into())),
            )
            .await;
        let body = get_json(event_routes(state), "/relays").await;
        assert_eq!(body[0]["preview"], "Ping");
        assert_eq!(body[0]["result"]["status"], "success");
    }

    #[tokio::test]
    async fn events_streams_published_messages() {
        let state = state();
        let broadcaster = state.broadcaster.clone();
        let resp = event_routes(state)
            .oneshot(Request::get("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.publish(Message::new("hello"));
        broadcaster.publish(Message::new("line one\nline two"));

        let mut body = resp.into_body().into_data_stream();
        let mut received = String::new();
        while !received.contains("line two") {
            let chunk = body.next().await.unwrap().unwrap();
            received.push_str(std::str::from_utf8(&chunk).unwrap());
        }
        assert_eq!(
            received,
            "data: hello\n\ndata: line one\ndata: line two\n\n"
        );

        drop(body);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
