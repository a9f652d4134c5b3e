//! HTTP surface consumed by the chatbot widget and the registration forms.

pub mod error;
pub mod handlers;
pub mod router;

pub use router::build_router;

use crate::relay::RelayHandler;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandler,
}

impl AppState {
    pub fn new(relay: RelayHandler) -> Self {
        Self { relay }
    }
}
