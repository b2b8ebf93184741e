//! Message relay: generate an answer, publish it, mail the link.

pub mod history;
pub mod pipeline;
pub mod types;

pub use history::{RelayHistory, RelayRecord};
pub use pipeline::{
    DEFAULT_SUBJECT, RelayPipeline, generate_and_deliver, generate_and_deliver_to, subject_for,
};
pub use types::{Message, RelayResult, RelayStatus, RelayStep};
