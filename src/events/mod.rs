//! Server-sent event stream of observed messages.

pub mod broadcast;
pub mod routes;

pub use broadcast::{DEFAULT_BROADCAST_CAPACITY, MessageBroadcaster};
pub use routes::{EVENTS_PATH, EventsState, event_routes};
