// PostgreSQL-backed store

use async_trait::async_trait;

use super::ScheduleStore;
use crate::db::repositories::{DeviceRepository, TrackedQueueRepository};
use crate::db::DbPool;
use crate::errors::StorageError;
use crate::models::{Device, TrackedQueue};

/// Store backed by the `tracked_queues` and `devices` tables
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: DbPool,
    queues: TrackedQueueRepository,
    devices: DeviceRepository,
}

impl PostgresStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            queues: TrackedQueueRepository::new(pool.clone()),
            devices: DeviceRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl ScheduleStore for PostgresStore {
    async fn list_tracked_queues(&self) -> Result<Vec<TrackedQueue>, StorageError> {
        self.queues.list().await
    }

    async fn list_devices(&self) -> Result<Vec<Device>, StorageError> {
        self.devices.list().await
    }

    async fn save_intervals(
        &self,
        account: i64,
        queue: &str,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let intervals = serde_json::to_string(payload)?;
        self.queues.upsert(account, queue, &intervals).await
    }

    async fn get_intervals(
        &self,
        account: i64,
        queue: &str,
    ) -> Result<Option<String>, StorageError> {
        self.queues.find(account, queue).await
    }

    async fn clear_intervals(&self, account: i64, queue: &str) -> Result<(), StorageError> {
        self.queues.clear(account, queue).await
    }

    async fn save_device(&self, device: &Device) -> Result<(), StorageError> {
        self.devices.upsert(device).await
    }

    async fn get_device(&self, device_uuid: &str) -> Result<Option<Device>, StorageError> {
        self.devices.find(device_uuid).await
    }

    async fn delete_device(&self, device_uuid: &str) -> Result<(), StorageError> {
        self.devices.delete(device_uuid).await
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.pool.health_check().await
    }
}
