use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::notifier::NotifierClient;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub notifier: Arc<NotifierClient>,
    /// Bounds concurrent bulk (CSV/NDJSON) exports across all handlers.
    pub bulk_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, notifier: NotifierClient) -> Self {
        Self {
            db,
            bulk_semaphore: Arc::new(Semaphore::new(config.bulk_concurrent_limit)),
            config: Arc::new(config),
            notifier: Arc::new(notifier),
        }
    }
}
