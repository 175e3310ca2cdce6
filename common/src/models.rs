use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Queue identifiers published by the distribution company
pub const VALID_QUEUES: [&str; 12] = [
    "1/1", "1/2", "2/1", "2/2", "3/1", "3/2", "4/1", "4/2", "5/1", "5/2", "6/1", "6/2",
];

/// Returns true if `queue` is one of the published queue identifiers
pub fn is_valid_queue(queue: &str) -> bool {
    VALID_QUEUES.contains(&queue)
}

// ============================================================================
// Tracked queue models
// ============================================================================

/// One monitored outage schedule, keyed by `(account, queue)`
///
/// `intervals` holds the raw JSON payload exactly as it was last persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedQueue {
    pub account: i64,
    pub queue: String,
    #[serde(default)]
    pub intervals: String,
}

impl TrackedQueue {
    pub fn new(account: i64, queue: impl Into<String>, intervals: impl Into<String>) -> Self {
        Self {
            account,
            queue: queue.into(),
            intervals: intervals.into(),
        }
    }

    /// Personal account numbers are positive; anything else counts as absent
    pub fn has_account(&self) -> bool {
        self.account > 0
    }
}

/// A tracked queue merged with the freshly fetched upstream payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRecord {
    #[serde(flatten)]
    pub tracked: TrackedQueue,
    pub oblenergo_response: serde_json::Value,
}

impl FetchedRecord {
    pub fn new(tracked: TrackedQueue, oblenergo_response: serde_json::Value) -> Self {
        Self {
            tracked,
            oblenergo_response,
        }
    }

    pub fn account(&self) -> i64 {
        self.tracked.account
    }

    pub fn queue(&self) -> &str {
        &self.tracked.queue
    }
}

// ============================================================================
// Device models
// ============================================================================

/// Platform of a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Ios,
    Android,
    Web,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ios => "IOS",
            DeviceType::Android => "ANDROID",
            DeviceType::Web => "WEB",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IOS" => Ok(DeviceType::Ios),
            "ANDROID" => Ok(DeviceType::Android),
            "WEB" => Ok(DeviceType::Web),
            other => Err(ValidationError::InvalidFieldValue {
                field: "device_type".to_string(),
                reason: format!("'{}' is not one of IOS, ANDROID, WEB", other),
            }),
        }
    }
}

/// A device registered for push notifications about one queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_uuid: String,
    pub device_type: DeviceType,
    pub push_address: String,
    pub watched_queue: String,
    #[serde(default)]
    pub device_details: Option<String>,
}

impl Device {
    /// Check the fields a device must carry before it can be stored
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.device_uuid.trim().is_empty() {
            return Err(ValidationError::MissingField("device_uuid".to_string()));
        }
        if self.push_address.trim().is_empty() {
            return Err(ValidationError::MissingField("push_address".to_string()));
        }
        if !is_valid_queue(&self.watched_queue) {
            return Err(ValidationError::InvalidFieldValue {
                field: "watched_queue".to_string(),
                reason: format!("'{}' is not a known queue", self.watched_queue),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Cycle results
// ============================================================================

/// Result of one change-detection cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub changed_queues: Vec<String>,
    pub count: usize,
}

impl CycleOutcome {
    pub fn new(changed_queues: Vec<String>) -> Self {
        let count = changed_queues.len();
        Self {
            changed_queues,
            count,
        }
    }
}

/// Result of a change check including the pushes it scheduled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub detected_changes: Vec<String>,
    pub pushes_scheduled: usize,
}
