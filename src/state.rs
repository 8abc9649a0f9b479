use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::bus::{LocalBus, SessionBus};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub bus: Arc<dyn SessionBus>,
    /// How long a fresh socket may take to send its hello frame.
    pub handshake_timeout: Duration,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config) -> Self {
        Self {
            db,
            bus: Arc::new(LocalBus::new(config.spectator_buffer)),
            handshake_timeout: config.handshake_timeout,
        }
    }
}
