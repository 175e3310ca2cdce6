// Change-check flow shared by the HTTP layer

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::detector::ChangeDetector;
use crate::errors::{ServiceError, StorageError};
use crate::models::{CheckReport, Device, TrackedQueue};
use crate::notify::{plan_notifications, NotificationSender};
use crate::store::ScheduleStore;

/// Single-flight wrapper around the change detector
///
/// The detector sits behind a mutex: a check or a device registration waits
/// for any running cycle to finish before touching the cached state.
pub struct ChangeCheckService {
    detector: Mutex<ChangeDetector>,
    sender: Arc<NotificationSender>,
    store: Arc<dyn ScheduleStore>,
}

impl ChangeCheckService {
    pub fn new(detector: ChangeDetector, sender: Arc<NotificationSender>) -> Self {
        let store = detector.store().clone();
        Self {
            detector: Mutex::new(detector),
            sender,
            store,
        }
    }

    /// Run one cycle and enqueue a push for every watcher of a changed queue
    #[instrument(skip(self))]
    pub async fn check_changes(&self) -> Result<CheckReport, StorageError> {
        let mut detector = self.detector.lock().await;
        let outcome = detector.seek_changes().await?;

        let mut pushes_scheduled = 0;
        for address in plan_notifications(&outcome.changed_queues, detector.devices()) {
            match self.sender.enqueue(address) {
                Ok(()) => pushes_scheduled += 1,
                Err(e) => {
                    warn!(error = %e, "Could not enqueue push notification");
                    break;
                }
            }
        }

        info!(
            detected_changes = outcome.count,
            pushes_scheduled, "Change check finished"
        );
        Ok(CheckReport {
            detected_changes: outcome.changed_queues,
            pushes_scheduled,
        })
    }

    /// Validate and persist a device, then refresh the cached device list
    #[instrument(skip(self, device), fields(device_uuid = %device.device_uuid))]
    pub async fn register_device(&self, device: Device) -> Result<(), ServiceError> {
        device.validate()?;

        let mut detector = self.detector.lock().await;
        self.store.save_device(&device).await?;
        detector.repopulate_devices().await?;

        info!(watched_queue = %device.watched_queue, "Device registered");
        Ok(())
    }

    /// Devices as currently stored, read after any running cycle
    pub async fn list_devices(&self) -> Result<Vec<Device>, StorageError> {
        let _detector = self.detector.lock().await;
        self.store.list_devices().await
    }

    pub async fn list_intervals(&self) -> Result<Vec<TrackedQueue>, StorageError> {
        let _detector = self.detector.lock().await;
        self.store.list_tracked_queues().await
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        self.store.health_check().await
    }

    pub fn sender(&self) -> &Arc<NotificationSender> {
        &self.sender
    }
}
