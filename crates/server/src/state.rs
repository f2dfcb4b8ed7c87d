use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scout_core::{Config, Dispatcher, IndexerStore, ReleaseEngine, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<ReleaseEngine>,
    dispatcher: Arc<Dispatcher>,
    /// Cancelled on shutdown; searches run under child tokens.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<ReleaseEngine>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            engine,
            dispatcher,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &ReleaseEngine {
        &self.engine
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<dyn IndexerStore> {
        self.engine.store()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}
