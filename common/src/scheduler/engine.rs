// Periodic change-check trigger

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::config::TriggerConfig;
use crate::errors::TriggerError;

/// Summary returned by the check endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub detected_changes: Vec<String>,
    #[serde(default)]
    pub pushes_scheduled: usize,
}

/// Something that can start one change check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckTrigger: Send + Sync {
    async fn trigger(&self) -> Result<TriggerResponse, TriggerError>;
}

/// Calls `GET {api_base_url}/checkChanges`
pub struct HttpCheckTrigger {
    client: Client,
    url: String,
}

impl HttpCheckTrigger {
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self, TriggerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriggerError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}/checkChanges", api_base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &TriggerConfig) -> Result<Self, TriggerError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CheckTrigger for HttpCheckTrigger {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn trigger(&self) -> Result<TriggerResponse, TriggerError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| TriggerError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriggerError::UnexpectedStatus(status.as_u16()));
        }

        response
            .json::<TriggerResponse>()
            .await
            .map_err(|e| TriggerError::RequestFailed(e.to_string()))
    }
}

/// Drives a `CheckTrigger` on a fixed interval until stopped
pub struct TriggerEngine {
    period: Duration,
    trigger: Arc<dyn CheckTrigger>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TriggerEngine {
    pub fn new(period: Duration, trigger: Arc<dyn CheckTrigger>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            period,
            trigger,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Run one trigger and log its outcome
    pub async fn tick(&self) -> Result<TriggerResponse, TriggerError> {
        debug!("Triggering change check");
        match self.trigger.trigger().await {
            Ok(response) => {
                info!(
                    detected_changes = ?response.detected_changes,
                    pushes_scheduled = response.pushes_scheduled,
                    "Change check completed"
                );
                Ok(response)
            }
            Err(e) => {
                error!(error = %e, "Change check trigger failed");
                Err(e)
            }
        }
    }

    /// Tick until `stop` is called; the first tick fires immediately
    #[instrument(skip(self), fields(period_seconds = self.period.as_secs()))]
    pub async fn start(&self) {
        info!("Starting trigger engine");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping trigger engine");
                    break;
                }
            }
        }

        info!("Trigger engine stopped");
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_joins_base() {
        let trigger = HttpCheckTrigger::new("http://api:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(trigger.url(), "http://api:8080/checkChanges");
    }

    #[tokio::test]
    async fn test_http_trigger_parses_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/checkChanges"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "Success",
                "detected_changes": ["1/1"],
                "pushes_scheduled": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let trigger = HttpCheckTrigger::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let response = trigger.trigger().await.unwrap();
        assert_eq!(response.result, "Success");
        assert_eq!(response.detected_changes, vec!["1/1"]);
        assert_eq!(response.pushes_scheduled, 3);
    }

    #[tokio::test]
    async fn test_http_trigger_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let trigger = HttpCheckTrigger::new(&server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            trigger.trigger().await,
            Err(TriggerError::UnexpectedStatus(500))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_keeps_ticking_after_failures() {
        let mut trigger = MockCheckTrigger::new();
        let mut calls = 0;
        trigger.expect_trigger().times(3).returning(move || {
            calls += 1;
            if calls == 1 {
                Err(TriggerError::RequestFailed("connection refused".to_string()))
            } else {
                Ok(TriggerResponse::default())
            }
        });

        let engine = Arc::new(TriggerEngine::new(Duration::from_secs(60), Arc::new(trigger)));
        let runner = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.start().await })
        };

        // Ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        engine.stop();
        runner.await.unwrap();
    }
}
