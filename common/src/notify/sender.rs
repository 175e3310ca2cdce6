// Background push delivery worker

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::NotificationConfig;
use crate::errors::NotificationError;
use crate::telemetry;

/// Title and body shown on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.title.clone(), config.body.clone())
    }
}

/// Delivers a single push to one device token
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), NotificationError>;
}

/// Transport that only logs, for development
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), NotificationError> {
        info!(
            token = token,
            title = %message.title,
            body = %message.body,
            "Push notification (log transport)"
        );
        Ok(())
    }
}

/// Queue of push addresses drained by a single worker task
///
/// `enqueue` never waits on delivery. `stop` signals the worker and waits for
/// it to exit; anything still queued at that point is dropped.
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<String>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationSender {
    /// Spawn the worker task on the current runtime
    pub fn start(transport: Arc<dyn PushTransport>, message: PushMessage) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let worker = tokio::spawn(run_worker(transport, message, rx, shutdown_rx));
        info!("Notification worker started");

        Self {
            tx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue one push for delivery
    pub fn enqueue(&self, push_address: impl Into<String>) -> Result<(), NotificationError> {
        self.tx
            .send(push_address.into())
            .map_err(|_| NotificationError::WorkerStopped)?;
        telemetry::record_notifications_enqueued(1);
        Ok(())
    }

    /// Stop the worker and wait for it to exit
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        info!("Stopping notification worker");
        let _ = self.shutdown_tx.send(());

        if let Err(e) = worker.await {
            error!(error = %e, "Notification worker terminated abnormally");
        }
        info!("Notification worker stopped");
    }
}

async fn run_worker(
    transport: Arc<dyn PushTransport>,
    message: PushMessage,
    mut rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!("Shutdown signal received by notification worker");
                break;
            }
            next = rx.recv() => {
                let Some(token) = next else {
                    break;
                };
                deliver(transport.as_ref(), &token, &message).await;
            }
        }
    }
}

#[instrument(skip(transport, message))]
async fn deliver(transport: &dyn PushTransport, token: &str, message: &PushMessage) {
    match transport.send(token, message).await {
        Ok(()) => {
            debug!("Push delivered");
            telemetry::record_notification_result(true);
        }
        Err(e) => {
            error!(error = %e, "Push delivery failed");
            telemetry::record_notification_result(false);
        }
    }
}
