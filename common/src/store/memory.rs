// In-process store for development and tests

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ScheduleStore;
use crate::errors::StorageError;
use crate::models::{Device, TrackedQueue};

/// Keeps everything in insertion-ordered vectors
#[derive(Debug, Default)]
pub struct MemoryStore {
    queues: RwLock<Vec<TrackedQueue>>,
    devices: RwLock<Vec<Device>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with tracked queues and devices
    pub fn with_data(queues: Vec<TrackedQueue>, devices: Vec<Device>) -> Self {
        Self {
            queues: RwLock::new(queues),
            devices: RwLock::new(devices),
        }
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn list_tracked_queues(&self) -> Result<Vec<TrackedQueue>, StorageError> {
        Ok(self.queues.read().await.clone())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, StorageError> {
        Ok(self.devices.read().await.clone())
    }

    async fn save_intervals(
        &self,
        account: i64,
        queue: &str,
        payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let intervals = serde_json::to_string(payload)?;
        let mut queues = self.queues.write().await;

        match queues
            .iter_mut()
            .find(|tracked| tracked.account == account && tracked.queue == queue)
        {
            Some(tracked) => tracked.intervals = intervals,
            None => queues.push(TrackedQueue::new(account, queue, intervals)),
        }
        Ok(())
    }

    async fn get_intervals(
        &self,
        account: i64,
        queue: &str,
    ) -> Result<Option<String>, StorageError> {
        Ok(self
            .queues
            .read()
            .await
            .iter()
            .find(|tracked| tracked.account == account && tracked.queue == queue)
            .map(|tracked| tracked.intervals.clone()))
    }

    async fn clear_intervals(&self, account: i64, queue: &str) -> Result<(), StorageError> {
        if let Some(tracked) = self
            .queues
            .write()
            .await
            .iter_mut()
            .find(|tracked| tracked.account == account && tracked.queue == queue)
        {
            tracked.intervals.clear();
        }
        Ok(())
    }

    async fn save_device(&self, device: &Device) -> Result<(), StorageError> {
        let mut devices = self.devices.write().await;
        match devices
            .iter_mut()
            .find(|known| known.device_uuid == device.device_uuid)
        {
            Some(known) => *known = device.clone(),
            None => devices.push(device.clone()),
        }
        Ok(())
    }

    async fn get_device(&self, device_uuid: &str) -> Result<Option<Device>, StorageError> {
        Ok(self
            .devices
            .read()
            .await
            .iter()
            .find(|device| device.device_uuid == device_uuid)
            .cloned())
    }

    async fn delete_device(&self, device_uuid: &str) -> Result<(), StorageError> {
        self.devices
            .write()
            .await
            .retain(|device| device.device_uuid != device_uuid);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
