//! Shared state handed to HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use trusthub_agents::Dispatcher;
use trusthub_identity::TrustRegistry;

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<TrustRegistry>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, registry: Arc<TrustRegistry>) -> Self {
        Self {
            dispatcher,
            registry,
            start_time: Instant::now(),
        }
    }
}
