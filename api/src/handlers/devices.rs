use axum::{extract::State, Json};
use serde::Deserialize;

use crate::handlers::{ErrorResponse, MessageResponse};
use crate::state::AppState;
use common::errors::{ApiError, ValidationError};
use common::models::{Device, DeviceType};

/// Device registration body
///
/// Fields default to empty so that a missing field is reported through the
/// regular validation envelope.
#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub device_uuid: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub push_address: String,
    #[serde(default)]
    pub watched_queue: String,
    #[serde(default)]
    pub device_details: Option<String>,
}

impl TryFrom<RegisterDeviceRequest> for Device {
    type Error = ValidationError;

    fn try_from(req: RegisterDeviceRequest) -> Result<Self, Self::Error> {
        if req.device_type.is_empty() {
            return Err(ValidationError::MissingField("device_type".to_string()));
        }

        let device = Device {
            device_uuid: req.device_uuid,
            device_type: req.device_type.parse::<DeviceType>()?,
            push_address: req.push_address,
            watched_queue: req.watched_queue,
            device_details: req.device_details,
        };
        device.validate()?;
        Ok(device)
    }
}

/// All registered devices
#[tracing::instrument(skip(state))]
pub async fn list_devices(State(state): State<AppState>) -> Result<Json<Vec<Device>>, ErrorResponse> {
    let devices = state
        .service
        .list_devices()
        .await
        .map_err(|e| ErrorResponse::from(ApiError::from(e)))?;

    Ok(Json(devices))
}

/// Register or update a device
#[tracing::instrument(skip(state, req))]
pub async fn register_device(
    State(state): State<AppState>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<MessageResponse, ErrorResponse> {
    let device = Device::try_from(req).map_err(|e| {
        tracing::debug!(error = %e, "Rejected device registration");
        ErrorResponse::from(ApiError::from(e))
    })?;
    let device_uuid = device.device_uuid.clone();

    state.service.register_device(device).await.map_err(|e| {
        tracing::error!(device_uuid = %device_uuid, error = %e, "Failed to register device");
        ErrorResponse::from(ApiError::from(e))
    })?;

    tracing::info!(device_uuid = %device_uuid, "Device saved");
    Ok(MessageResponse::new("Device saved"))
}
