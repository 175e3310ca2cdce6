// Device repository: registered push targets keyed by device uuid

use crate::db::DbPool;
use crate::errors::StorageError;
use crate::models::{Device, DeviceType};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;

/// Repository for registered devices
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: DbPool,
}

impl DeviceRepository {
    /// Create a new DeviceRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Device, StorageError> {
        let device_type: String = row.try_get("device_type")?;
        let device_type = device_type.parse::<DeviceType>().map_err(|e| {
            StorageError::QueryFailed(format!("Failed to parse device_type: {}", e))
        })?;

        Ok(Device {
            device_uuid: row.try_get("device_uuid")?,
            device_type,
            push_address: row.try_get("push_address")?,
            watched_queue: row.try_get("watched_queue")?,
            device_details: row.try_get("device_details")?,
        })
    }

    /// List every registered device in registration order
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Device>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT device_uuid, device_type, push_address, watched_queue, device_details
            FROM devices
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;

        let devices = rows
            .iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = devices.len(), "Loaded devices");
        Ok(devices)
    }

    /// Find a device by uuid
    #[instrument(skip(self))]
    pub async fn find(&self, device_uuid: &str) -> Result<Option<Device>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT device_uuid, device_type, push_address, watched_queue, device_details
            FROM devices
            WHERE device_uuid = $1
            "#,
        )
        .bind(device_uuid)
        .fetch_optional(self.pool.pool())
        .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    /// Update the device if it is known, register it otherwise
    #[instrument(skip(self, device), fields(device_uuid = %device.device_uuid))]
    pub async fn upsert(&self, device: &Device) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO devices (
                device_uuid, device_type, push_address, watched_queue, device_details, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (device_uuid)
            DO UPDATE SET
                device_type = EXCLUDED.device_type,
                push_address = EXCLUDED.push_address,
                watched_queue = EXCLUDED.watched_queue,
                device_details = EXCLUDED.device_details,
                updated_at = NOW()
            "#,
        )
        .bind(&device.device_uuid)
        .bind(device.device_type.as_str())
        .bind(&device.push_address)
        .bind(&device.watched_queue)
        .bind(&device.device_details)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(watched_queue = %device.watched_queue, "Device saved");
        Ok(())
    }

    /// Remove a device
    #[instrument(skip(self))]
    pub async fn delete(&self, device_uuid: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM devices WHERE device_uuid = $1")
            .bind(device_uuid)
            .execute(self.pool.pool())
            .await?;

        Ok(())
    }
}
