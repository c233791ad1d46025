use std::sync::Arc;

use crate::error::StorageError;
use crate::models::{StatsPoint, StatsQuery};
use crate::repository::BannerStorage;

/// Pass-through orchestration layer. Holds no state between requests and
/// adds no logic; it exists so the transport layer depends on the capability
/// set rather than the concrete store.
#[derive(Clone)]
pub struct BannerService {
    storage: Arc<dyn BannerStorage>,
}

impl BannerService {
    pub fn new(storage: Arc<dyn BannerStorage>) -> Self {
        Self { storage }
    }

    pub async fn save_statistics(&self, banner_id: i64) -> Result<(), StorageError> {
        self.storage.save_statistics(banner_id).await
    }

    pub async fn create_banner(&self, name: &str) -> Result<(), StorageError> {
        self.storage.create_banner(name).await
    }

    pub async fn load_stats(&self, query: StatsQuery) -> Result<Vec<StatsPoint>, StorageError> {
        self.storage.load_stats(query).await
    }
}
