// Firebase Cloud Messaging HTTP v1 transport

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::sender::{PushMessage, PushTransport};
use crate::config::FcmConfig;
use crate::errors::NotificationError;

pub const FCM_BASE_URL: &str = "https://fcm.googleapis.com";
pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 60;

/// The fields of a Google service account key file that the grant needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, NotificationError> {
        serde_json::from_str(raw).map_err(|e| NotificationError::InvalidServiceAccount(e.to_string()))
    }

    pub fn from_file(path: &str) -> Result<Self, NotificationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NotificationError::InvalidServiceAccount(format!("Cannot read {}: {}", path, e))
        })?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECONDS) < self.expires_at
    }
}

/// Sends pushes through FCM using a service-account access token
pub struct FcmTransport {
    client: Client,
    send_url: String,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token: RwLock<Option<CachedToken>>,
}

impl FcmTransport {
    pub fn new(
        project_id: &str,
        key: ServiceAccountKey,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        Self::with_base_url(FCM_BASE_URL, project_id, key, timeout)
    }

    /// Same as `new` but against a different FCM host
    pub fn with_base_url(
        base_url: &str,
        project_id: &str,
        key: ServiceAccountKey,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| NotificationError::InvalidServiceAccount(e.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
            key,
            encoding_key,
            token: RwLock::new(None),
        })
    }

    pub fn from_config(config: &FcmConfig) -> Result<Self, NotificationError> {
        let key = match (&config.service_account_json, &config.service_account_path) {
            (Some(raw), _) => ServiceAccountKey::from_json(raw)?,
            (None, Some(path)) => ServiceAccountKey::from_file(path)?,
            (None, None) => {
                return Err(NotificationError::InvalidServiceAccount(
                    "No service account configured".to_string(),
                ))
            }
        };

        info!(project_id = %config.project_id, client_email = %key.client_email, "FCM transport configured");
        Self::new(
            &config.project_id,
            key,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, NotificationError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECONDS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| NotificationError::TokenSigning(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn request_token(&self) -> Result<CachedToken, NotificationError> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| NotificationError::TokenRequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::TokenRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::TokenRequestFailed(e.to_string()))?;

        debug!(expires_in = token.expires_in, "Obtained FCM access token");
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + ChronoDuration::seconds(token.expires_in),
        })
    }

    /// Cached access token, refreshed shortly before it expires
    async fn access_token(&self) -> Result<String, NotificationError> {
        {
            let cache = self.token.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(Utc::now()) {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *self.token.write().await = Some(fresh);
        Ok(access_token)
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    #[instrument(skip(self, message))]
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), NotificationError> {
        let access_token = self.access_token().await?;

        let body = json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                }
            }
        });

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::DeliveryFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        debug!("FCM accepted message");
        Ok(())
    }
}
