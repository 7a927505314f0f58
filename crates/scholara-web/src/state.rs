use std::sync::{Arc, Mutex, MutexGuard};

use scholara_store::Store;

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub client: reqwest::Client,
    store: Mutex<Store>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Store) -> Result<Arc<Self>, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;
        Ok(Arc::new(Self {
            config,
            client,
            store: Mutex::new(store),
        }))
    }

    /// Lock the store. Never hold the guard across an `.await`.
    pub fn store(&self) -> Result<MutexGuard<'_, Store>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::internal_message("store lock poisoned"))
    }
}
