//! Server application state

use finchat::{Config, RetrievalChain};
use tokio::sync::Mutex;

/// Shared application state for all route handlers
///
/// The server hosts a single conversation; handlers take the lock for the
/// whole operation so uploads, processing and questions never interleave.
pub struct AppState {
    pub chain: Mutex<RetrievalChain>,
    pub config: Config,
}

impl AppState {
    pub fn new(chain: RetrievalChain, config: Config) -> Self {
        Self {
            chain: Mutex::new(chain),
            config,
        }
    }
}
