//! Relay: turns an inbound message into a logged, replied-to exchange.

mod handler;
pub mod prompt;

pub use handler::{ChatRequest, RelayHandler, RelayReply};
