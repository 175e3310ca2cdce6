// Change detector: owns the cached cycle state and drives polling cycles

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::differ::SnapshotDiffer;
use crate::errors::StorageError;
use crate::models::{CycleOutcome, Device, TrackedQueue};
use crate::store::ScheduleStore;
use crate::telemetry;
use crate::upstream::ScheduleFetcher;

/// Cycle state plus the collaborators a cycle needs
///
/// Not internally synchronized: callers serialize access (see `ChangeCheckService`).
pub struct ChangeDetector {
    store: Arc<dyn ScheduleStore>,
    fetcher: Arc<dyn ScheduleFetcher>,
    differ: SnapshotDiffer,
    queues: Vec<TrackedQueue>,
    devices: Vec<Device>,
    last_update_queues: Option<DateTime<Utc>>,
    last_update_devices: Option<DateTime<Utc>>,
}

impl ChangeDetector {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        fetcher: Arc<dyn ScheduleFetcher>,
        differ: SnapshotDiffer,
    ) -> Self {
        Self {
            store,
            fetcher,
            differ,
            queues: Vec::new(),
            devices: Vec::new(),
            last_update_queues: None,
            last_update_devices: None,
        }
    }

    /// Initial load of tracked queues and devices
    #[instrument(skip(self))]
    pub async fn populate(&mut self) -> Result<(), StorageError> {
        info!("Start populating change detector");
        self.queues = self.store.list_tracked_queues().await?;
        self.devices = self.store.list_devices().await?;

        let now = Utc::now();
        self.last_update_queues = Some(now);
        self.last_update_devices = Some(now);

        telemetry::update_state_gauges(self.queues.len(), self.devices.len());
        info!(
            queues = self.queues.len(),
            devices = self.devices.len(),
            "End populating change detector"
        );
        Ok(())
    }

    /// Reload only the device list, after a registration
    #[instrument(skip(self))]
    pub async fn repopulate_devices(&mut self) -> Result<(), StorageError> {
        info!(devices = self.devices.len(), "Start repopulating devices");
        self.devices = self.store.list_devices().await?;
        self.last_update_devices = Some(Utc::now());

        telemetry::update_state_gauges(self.queues.len(), self.devices.len());
        info!(devices = self.devices.len(), "End repopulating devices");
        Ok(())
    }

    /// Run one polling cycle
    ///
    /// Every fetched payload is saved whether or not it changed; a failed save
    /// is logged and does not stop the cycle. Only the final reload of the
    /// tracked-queue list can fail the cycle.
    #[instrument(skip(self), fields(queues = self.queues.len()))]
    pub async fn seek_changes(&mut self) -> Result<CycleOutcome, StorageError> {
        let started = Instant::now();
        info!("Start seek_changes");

        let fetched = self.fetcher.fetch_all(&self.queues).await;
        let outcome = self.differ.find_changes(&fetched);

        for record in &fetched {
            if let Err(e) = self
                .store
                .save_intervals(record.account(), record.queue(), &record.oblenergo_response)
                .await
            {
                error!(
                    account = record.account(),
                    queue = record.queue(),
                    error = %e,
                    "Failed to save intervals"
                );
                telemetry::record_save_failure(record.queue());
            }
        }

        self.queues = self.store.list_tracked_queues().await?;
        self.last_update_queues = Some(Utc::now());

        telemetry::record_cycle(outcome.count, started.elapsed().as_secs_f64());
        telemetry::update_state_gauges(self.queues.len(), self.devices.len());
        info!(
            changed = ?outcome.changed_queues,
            count = outcome.count,
            fetched = fetched.len(),
            "End seek_changes"
        );
        Ok(outcome)
    }

    pub fn tracked_queues(&self) -> &[TrackedQueue] {
        &self.queues
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn last_update_queues(&self) -> Option<DateTime<Utc>> {
        self.last_update_queues
    }

    pub fn last_update_devices(&self) -> Option<DateTime<Utc>> {
        self.last_update_devices
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceType, FetchedRecord};
    use crate::store::{MemoryStore, MockScheduleStore};
    use crate::upstream::MockScheduleFetcher;
    use serde_json::{json, Value};

    fn payload(entries: &[(&str, &str)]) -> Value {
        let data: Vec<Value> = entries
            .iter()
            .map(|(start, end)| json!({"acc_begin": start, "accend_plan": end}))
            .collect();
        json!({ "aData": data })
    }

    fn device(uuid: &str, queue: &str) -> Device {
        Device {
            device_uuid: uuid.to_string(),
            device_type: DeviceType::Android,
            push_address: format!("token-{}", uuid),
            watched_queue: queue.to_string(),
            device_details: None,
        }
    }

    /// Fetcher that answers every tracked queue with the same payload
    fn echo_fetcher(response: Value) -> MockScheduleFetcher {
        let mut fetcher = MockScheduleFetcher::new();
        fetcher.expect_fetch_all().returning(move |queues| {
            queues
                .iter()
                .map(|tracked| FetchedRecord::new(tracked.clone(), response.clone()))
                .collect()
        });
        fetcher
    }

    #[tokio::test]
    async fn test_populate_loads_state() {
        let store = Arc::new(MemoryStore::with_data(
            vec![TrackedQueue::new(1, "1/1", "")],
            vec![device("a", "1/1")],
        ));
        let mut detector = ChangeDetector::new(
            store,
            Arc::new(echo_fetcher(json!({}))),
            SnapshotDiffer::default(),
        );

        assert!(detector.last_update_queues().is_none());
        detector.populate().await.unwrap();

        assert_eq!(detector.tracked_queues().len(), 1);
        assert_eq!(detector.devices().len(), 1);
        assert!(detector.last_update_queues().is_some());
        assert!(detector.last_update_devices().is_some());
    }

    #[tokio::test]
    async fn test_repopulate_devices_leaves_queues_alone() {
        let store = Arc::new(MemoryStore::with_data(
            vec![TrackedQueue::new(1, "1/1", "")],
            vec![],
        ));
        let mut detector = ChangeDetector::new(
            store.clone(),
            Arc::new(echo_fetcher(json!({}))),
            SnapshotDiffer::default(),
        );
        detector.populate().await.unwrap();
        let queues_stamp = detector.last_update_queues();

        store.save_device(&device("b", "2/2")).await.unwrap();
        store.save_intervals(2, "2/2", &json!({})).await.unwrap();
        detector.repopulate_devices().await.unwrap();

        assert_eq!(detector.devices().len(), 1);
        assert_eq!(detector.tracked_queues().len(), 1);
        assert_eq!(detector.last_update_queues(), queues_stamp);
    }

    #[tokio::test]
    async fn test_unchanged_schedule_reports_nothing() {
        let same = payload(&[("01-01-2025 10:00", "01-01-2025 12:00")]);
        let store = Arc::new(MemoryStore::with_data(
            vec![TrackedQueue::new(1, "1/1", same.to_string())],
            vec![],
        ));
        let mut detector = ChangeDetector::new(
            store,
            Arc::new(echo_fetcher(same)),
            SnapshotDiffer::default(),
        );
        detector.populate().await.unwrap();

        let outcome = detector.seek_changes().await.unwrap();
        assert_eq!(outcome, CycleOutcome::new(vec![]));
    }

    #[tokio::test]
    async fn test_added_interval_reported_and_persisted() {
        let saved = payload(&[("01-01-2025 10:00", "01-01-2025 12:00")]);
        let fresh = payload(&[
            ("01-01-2025 10:00", "01-01-2025 12:00"),
            ("01-01-2025 18:00", "01-01-2025 20:00"),
        ]);
        let store = Arc::new(MemoryStore::with_data(
            vec![TrackedQueue::new(1, "4/1", saved.to_string())],
            vec![],
        ));
        let mut detector = ChangeDetector::new(
            store.clone(),
            Arc::new(echo_fetcher(fresh.clone())),
            SnapshotDiffer::default(),
        );
        detector.populate().await.unwrap();

        let outcome = detector.seek_changes().await.unwrap();
        assert_eq!(outcome.changed_queues, vec!["4/1"]);
        assert_eq!(outcome.count, 1);

        // The cached list reflects what was just written
        let cached: Value = serde_json::from_str(&detector.tracked_queues()[0].intervals).unwrap();
        assert_eq!(cached, fresh);

        // A second cycle with the same upstream data is quiet
        let outcome = detector.seek_changes().await.unwrap();
        assert_eq!(outcome.count, 0);
    }

    #[tokio::test]
    async fn test_save_failure_is_isolated() {
        let fresh = payload(&[("01-01-2025 10:00", "01-01-2025 12:00")]);
        let mut store = MockScheduleStore::new();
        store.expect_list_tracked_queues().returning(|| {
            Ok(vec![
                TrackedQueue::new(1, "1/1", ""),
                TrackedQueue::new(2, "2/1", ""),
            ])
        });
        store.expect_list_devices().returning(|| Ok(vec![]));
        store
            .expect_save_intervals()
            .withf(|account, _, _| *account == 1)
            .times(1)
            .returning(|_, _, _| Err(StorageError::QueryFailed("disk full".to_string())));
        store
            .expect_save_intervals()
            .withf(|account, _, _| *account == 2)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut detector = ChangeDetector::new(
            Arc::new(store),
            Arc::new(echo_fetcher(fresh)),
            SnapshotDiffer::default(),
        );
        detector.populate().await.unwrap();

        let outcome = detector.seek_changes().await.unwrap();
        assert_eq!(outcome.changed_queues, vec!["1/1", "2/1"]);
    }

    #[tokio::test]
    async fn test_dropped_fetch_is_neither_diffed_nor_saved() {
        let mut fetcher = MockScheduleFetcher::new();
        fetcher.expect_fetch_all().returning(|queues| {
            // Account 1 failed upstream and was dropped
            queues
                .iter()
                .filter(|tracked| tracked.account != 1)
                .map(|tracked| {
                    FetchedRecord::new(
                        tracked.clone(),
                        json!({"aData": [{"acc_begin": "01-01-2025 10:00", "accend_plan": "01-01-2025 12:00"}]}),
                    )
                })
                .collect()
        });

        let mut store = MockScheduleStore::new();
        store.expect_list_tracked_queues().returning(|| {
            Ok(vec![
                TrackedQueue::new(1, "1/1", ""),
                TrackedQueue::new(2, "2/1", ""),
            ])
        });
        store.expect_list_devices().returning(|| Ok(vec![]));
        store
            .expect_save_intervals()
            .withf(|account, queue, _| *account == 2 && queue == "2/1")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut detector =
            ChangeDetector::new(Arc::new(store), Arc::new(fetcher), SnapshotDiffer::default());
        detector.populate().await.unwrap();

        let outcome = detector.seek_changes().await.unwrap();
        assert_eq!(outcome.changed_queues, vec!["2/1"]);
    }

    #[tokio::test]
    async fn test_list_failure_fails_the_cycle() {
        let mut store = MockScheduleStore::new();
        store
            .expect_list_tracked_queues()
            .returning(|| Err(StorageError::ConnectionFailed("unreachable".to_string())));

        let mut detector = ChangeDetector::new(
            Arc::new(store),
            Arc::new(echo_fetcher(json!({}))),
            SnapshotDiffer::default(),
        );

        assert!(matches!(
            detector.seek_changes().await,
            Err(StorageError::ConnectionFailed(_))
        ));
    }
}
