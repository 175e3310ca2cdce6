// Upstream outage schedule client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::config::UpstreamConfig;
use crate::errors::FetchError;
use crate::models::{FetchedRecord, TrackedQueue};
use crate::telemetry;
use crate::throttle::ThrottlePolicy;

/// Default schedule endpoint of the regional distribution company
pub const DEFAULT_URL: &str = "https://interruptions.energy.cn.ua/api/info_disable";

const BROWSER_HEADERS: [(&str, &str); 14] = [
    ("accept", "*/*"),
    ("accept-language", "uk"),
    ("cache-control", "no-cache"),
    ("origin", "https://interruptions.energy.cn.ua"),
    ("pragma", "no-cache"),
    ("referer", "https://interruptions.energy.cn.ua/interruptions"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-storage-access", "none"),
    (
        "user-agent",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36",
    ),
    (
        "sec-ch-ua",
        "\"Google Chrome\";v=\"143\", \"Chromium\";v=\"143\", \"Not A(Brand\";v=\"24\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"macOS\""),
];

/// Fetches fresh schedules for a batch of tracked queues
///
/// Implementations drop records whose request failed instead of returning an
/// error, so the result may be shorter than the input.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleFetcher: Send + Sync {
    async fn fetch_all(&self, queues: &[TrackedQueue]) -> Vec<FetchedRecord>;
}

/// Sequential, throttled client for the interruptions API
pub struct OblenergoClient {
    client: Client,
    url: String,
    throttle: ThrottlePolicy,
}

impl OblenergoClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        throttle: ThrottlePolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(browser_headers())
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            throttle,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, FetchError> {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.timeout_seconds),
            ThrottlePolicy::from_millis(config.min_delay_ms, config.max_delay_ms),
        )
    }

    /// Request the current schedule for one account
    #[instrument(skip(self))]
    pub async fn fetch_account(&self, account: i64) -> Result<serde_json::Value, FetchError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "person_accnt": account }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let data = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        Ok(data)
    }
}

#[async_trait]
impl ScheduleFetcher for OblenergoClient {
    #[instrument(skip_all, fields(queues = queues.len()))]
    async fn fetch_all(&self, queues: &[TrackedQueue]) -> Vec<FetchedRecord> {
        info!("Start fetching upstream schedules");
        let mut results = Vec::with_capacity(queues.len());

        for tracked in queues {
            if !tracked.has_account() {
                warn!(queue = %tracked.queue, "Missing account field");
                continue;
            }

            let account = tracked.account;
            info!(account, "Start request for account");

            match self.fetch_account(account).await {
                Ok(data) => {
                    info!(account, data = %data, "End request for account");
                    results.push(FetchedRecord::new(tracked.clone(), data));
                }
                Err(e) => {
                    error!(account, error = %e, "Request failed for account");
                    telemetry::record_fetch_failure(&tracked.queue);
                }
            }

            self.throttle.pause().await;
        }

        info!(
            requested = queues.len(),
            fetched = results.len(),
            "End fetching upstream schedules"
        );
        results
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in BROWSER_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}
