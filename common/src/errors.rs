// Error handling framework

use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Upstream schedule fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to decode upstream response: {0}")]
    InvalidResponse(String),
}

/// Push notification errors
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification worker is not running")]
    WorkerStopped,

    #[error("Failed to load service account: {0}")]
    InvalidServiceAccount(String),

    #[error("Failed to sign token assertion: {0}")]
    TokenSigning(String),

    #[error("OAuth2 token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("Push delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

/// Errors raised while triggering a change check
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("Trigger request failed: {0}")]
    RequestFailed(String),

    #[error("Trigger endpoint returned status {0}")]
    UnexpectedStatus(u16),
}

/// Errors from operations that validate input before touching storage
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("VALIDATION_ERROR", err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let code = match err {
            StorageError::NotFound(_) => "NOT_FOUND",
            _ => "STORAGE_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => e.into(),
            ServiceError::Storage(e) => e.into(),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        ApiError::new("NOTIFICATION_ERROR", err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::ConnectionFailed(err.to_string())
            }
            sqlx::Error::Database(db_err) => StorageError::QueryFailed(db_err.message().to_string()),
            _ => StorageError::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidJson(err.to_string())
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::InvalidJson(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::InvalidResponse(err.to_string())
        } else {
            FetchError::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_status_display() {
        let err = FetchError::UnexpectedStatus {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("maintenance"));
    }

    #[test]
    fn test_validation_error_to_api_error() {
        let err = ValidationError::MissingField("device_uuid".to_string());
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "VALIDATION_ERROR");
        assert!(api_err.message.contains("device_uuid"));
    }

    #[test]
    fn test_storage_not_found_maps_to_not_found_code() {
        let api_err: ApiError = StorageError::NotFound("device".to_string()).into();
        assert_eq!(api_err.code, "NOT_FOUND");
    }

    #[test]
    fn test_api_error_with_details() {
        let err = ApiError::new("TEST_ERROR", "Test message")
            .with_details(serde_json::json!({"field": "value"}));
        assert!(err.details.is_some());
    }
}
