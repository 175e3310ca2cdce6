// Persistence for tracked queue snapshots and registered devices

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::models::{Device, TrackedQueue};

/// Storage backend for tracked queues and devices
///
/// Writes are keyed: `(account, queue)` for snapshots and `device_uuid` for
/// devices. An existing record is updated in place, a new one is appended.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn list_tracked_queues(&self) -> Result<Vec<TrackedQueue>, StorageError>;

    async fn list_devices(&self) -> Result<Vec<Device>, StorageError>;

    /// Persist the raw upstream payload as compact JSON text
    async fn save_intervals(
        &self,
        account: i64,
        queue: &str,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError>;

    async fn get_intervals(&self, account: i64, queue: &str)
        -> Result<Option<String>, StorageError>;

    async fn clear_intervals(&self, account: i64, queue: &str) -> Result<(), StorageError>;

    async fn save_device(&self, device: &Device) -> Result<(), StorageError>;

    async fn get_device(&self, device_uuid: &str) -> Result<Option<Device>, StorageError>;

    async fn delete_device(&self, device_uuid: &str) -> Result<(), StorageError>;

    async fn health_check(&self) -> Result<(), StorageError>;
}
