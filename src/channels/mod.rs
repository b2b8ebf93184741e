//! Source channels the relay listens on.

pub mod channel;
pub mod telegram;

pub use channel::*;
pub use telegram::{TelegramChannel, TelegramConfig};
