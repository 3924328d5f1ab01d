//! Nightscout upload.
//!
//! CareLink snapshots are normalized into Nightscout `entries` and
//! `devicestatus` records. When a Nightscout site is configured those records
//! are also posted to its REST API.
//!
//! # Example Configuration
//!
//! ```toml
//! [nightscout]
//! url = "https://my-site.herokuapp.com"
//! api_secret = "correct horse battery staple"
//! ```
//!
//! The secret is never sent as is. Nightscout expects its SHA-1 hex digest in
//! the `api-secret` header.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use bglink_core::{DeviceStatus, SgvEntry};

use crate::config::NightscoutConfig;

/// Path of the entries collection, relative to the site URL.
pub const ENTRIES_PATH: &str = "/api/v1/entries.json";
/// Path of the devicestatus collection, relative to the site URL.
pub const DEVICESTATUS_PATH: &str = "/api/v1/devicestatus.json";

/// SHA-1 hex digest of an API secret, as sent in the `api-secret` header.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha1::digest(secret.as_bytes()))
}

/// Client for one Nightscout site.
#[derive(Debug, Clone)]
pub struct NightscoutUploader {
    client: Client,
    base_url: String,
    hashed_secret: String,
}

impl NightscoutUploader {
    /// Build an uploader from configuration.
    ///
    /// Returns `Ok(None)` when no site URL is configured.
    pub fn from_config(config: &NightscoutConfig) -> Result<Option<Self>, UploadError> {
        let url = match &config.url {
            Some(url) if !url.is_empty() => url,
            _ => {
                debug!("Nightscout URL not configured; upload disabled");
                return Ok(None);
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| UploadError::Client(e.to_string()))?;

        info!("Uploading CareLink records to Nightscout at {}", url);
        Ok(Some(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            hashed_secret: hash_secret(config.api_secret.as_deref().unwrap_or_default()),
        }))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Post entries, then device status. Empty collections are skipped.
    pub async fn upload(
        &self,
        entries: &[SgvEntry],
        devicestatus: &[DeviceStatus],
    ) -> Result<(), UploadError> {
        if !entries.is_empty() {
            self.post(ENTRIES_PATH, entries).await?;
        }
        if !devicestatus.is_empty() {
            self.post(DEVICESTATUS_PATH, devicestatus).await?;
        }
        debug!(
            "Uploaded {} entries and {} devicestatus records to Nightscout",
            entries.len(),
            devicestatus.len()
        );
        Ok(())
    }

    async fn post<T: Serialize>(&self, path: &str, records: &[T]) -> Result<(), UploadError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header("api-secret", &self.hashed_secret)
            .json(records)
            .send()
            .await
            .map_err(|e| UploadError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Response {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Errors that can occur when uploading to Nightscout.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Nightscout returned error {status}: {body}")]
    Response { status: u16, body: String },
}

/// A local stand-in for a Nightscout site that records what it receives.
#[cfg(test)]
pub(crate) mod mock {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode, Uri},
        routing::post,
    };
    use serde_json::Value;

    /// One received request: path, `api-secret` header and JSON body.
    #[derive(Debug, Clone)]
    pub struct Received {
        pub path: String,
        pub secret: Option<String>,
        pub body: Value,
    }

    #[derive(Clone)]
    struct Site {
        status: StatusCode,
        received: Arc<Mutex<Vec<Received>>>,
    }

    async fn record(
        State(site): State<Site>,
        uri: Uri,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let secret = headers
            .get("api-secret")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        site.received.lock().unwrap().push(Received {
            path: uri.path().to_string(),
            secret,
            body,
        });
        site.status
    }

    /// Serve a site answering every upload with `status`. Returns its base URL.
    pub async fn serve(status: StatusCode) -> (String, Arc<Mutex<Vec<Received>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let site = Site {
            status,
            received: Arc::clone(&received),
        };
        let app = Router::new()
            .route(super::ENTRIES_PATH, post(record))
            .route(super::DEVICESTATUS_PATH, post(record))
            .with_state(site);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn config(url: Option<&str>, secret: &str) -> NightscoutConfig {
        NightscoutConfig {
            url: url.map(str::to_string),
            api_secret: Some(secret.to_string()),
        }
    }

    fn entry(sgv: f64, date: i64) -> SgvEntry {
        SgvEntry::new(sgv, date, "connect-paradigm")
    }

    #[test]
    fn test_hash_secret() {
        assert_eq!(hash_secret("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(hash_secret(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_unconfigured_is_disabled() {
        assert!(NightscoutUploader::from_config(&NightscoutConfig::default())
            .unwrap()
            .is_none());
        assert!(NightscoutUploader::from_config(&config(Some(""), "abc"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let uploader = NightscoutUploader::from_config(&config(Some("http://ns.local/"), "abc"))
            .unwrap()
            .unwrap();
        assert_eq!(uploader.base_url(), "http://ns.local");
    }

    #[tokio::test]
    async fn test_upload_posts_entries_with_hashed_secret() {
        let (url, received) = mock::serve(StatusCode::OK).await;
        let uploader = NightscoutUploader::from_config(&config(Some(&url), "abc"))
            .unwrap()
            .unwrap();

        let entries = vec![entry(118.0, 1_445_072_700_000), entry(124.0, 1_445_073_300_000)];
        uploader.upload(&entries, &[]).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].path, ENTRIES_PATH);
        assert_eq!(
            received[0].secret.as_deref(),
            Some("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        let body = received[0].body.as_array().unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[1]["sgv"], 124.0);
        assert_eq!(body[1]["type"], "sgv");
    }

    #[tokio::test]
    async fn test_upload_nothing_sends_nothing() {
        let (url, received) = mock::serve(StatusCode::OK).await;
        let uploader = NightscoutUploader::from_config(&config(Some(&url), "abc"))
            .unwrap()
            .unwrap();

        uploader.upload(&[], &[]).await.unwrap();
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _) = mock::serve(StatusCode::UNAUTHORIZED).await;
        let uploader = NightscoutUploader::from_config(&config(Some(&url), "wrong"))
            .unwrap()
            .unwrap();

        let err = uploader
            .upload(&[entry(100.0, 1_445_072_700_000)], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Response { status: 401, .. }));
    }
}
