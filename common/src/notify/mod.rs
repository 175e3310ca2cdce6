// Push notification fan-out and delivery

pub mod fanout;
pub mod fcm;
pub mod sender;

pub use fanout::plan_notifications;
pub use fcm::{FcmTransport, ServiceAccountKey};
pub use sender::{LogTransport, NotificationSender, PushMessage, PushTransport};

use std::sync::Arc;

use crate::config::{NotificationConfig, PushTransportKind};
use crate::errors::NotificationError;

/// Build the transport selected in configuration
pub fn transport_from_config(
    config: &NotificationConfig,
) -> Result<Arc<dyn PushTransport>, NotificationError> {
    match config.transport {
        PushTransportKind::Log => Ok(Arc::new(LogTransport)),
        PushTransportKind::Fcm => {
            let fcm = config.fcm.as_ref().ok_or_else(|| {
                NotificationError::InvalidServiceAccount("Missing [notifications.fcm] section".to_string())
            })?;
            Ok(Arc::new(FcmTransport::from_config(fcm)?))
        }
    }
}
