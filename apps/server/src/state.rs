use std::sync::Arc;

use crate::config::ServerConfig;
use crate::directory::KeyDirectoryTable;
use crate::presence::PresenceTable;

/// Shared application state passed to all handlers via Axum's State extractor.
///
/// Everything is `Arc`-wrapped so cloning `AppState` is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub directory: Arc<KeyDirectoryTable>,
    pub presence: Arc<PresenceTable>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let presence = PresenceTable::new(config.presence_channel_capacity);
        Self {
            config: Arc::new(config),
            directory: Arc::new(KeyDirectoryTable::new()),
            presence: Arc::new(presence),
        }
    }
}
