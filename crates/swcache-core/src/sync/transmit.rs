//! Delivery of queued records to the sync endpoint.

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use tracing::warn;
use url::Url;

use crate::models::PendingRecord;

use super::SyncError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Posts each record as JSON to `{endpoint}{kind collection}`,
/// e.g. `https://app.example/api/sync/verifications`.
#[derive(Clone)]
pub struct HttpTransmitter {
    client: Client,
    endpoint: Url,
    token: Option<String>,
    initial_backoff: Duration,
}

impl HttpTransmitter {
    pub fn new(endpoint: Url) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Fatal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: with_trailing_slash(endpoint),
            token: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Send records with a bearer token
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn record_url(&self, record: &PendingRecord) -> Result<Url, SyncError> {
        self.endpoint
            .join(record.kind.collection())
            .map_err(|e| SyncError::Fatal(format!("Invalid sync endpoint: {}", e)))
    }

    pub async fn send(&self, record: &PendingRecord) -> Result<(), SyncError> {
        let url = self.record_url(record)?;
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut request = self
                .client
                .post(url.clone())
                .header(header::ACCEPT, "application/json")
                .header("Idempotency-Key", record.id.as_str())
                .json(record);
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SyncError::Recoverable(format!("Network unavailable: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(SyncError::from_status(status.as_u16(), ""));
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_status(status.as_u16(), &body));
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use serde_json::json;

    #[test]
    fn test_record_url_per_kind() {
        let transmitter =
            HttpTransmitter::new(Url::parse("https://app.example/api/sync").unwrap()).unwrap();
        let verification = PendingRecord::new(RecordKind::Verification, json!({}));
        let report = PendingRecord::new(RecordKind::Report, json!({}));
        assert_eq!(
            transmitter.record_url(&verification).unwrap().as_str(),
            "https://app.example/api/sync/verifications"
        );
        assert_eq!(
            transmitter.record_url(&report).unwrap().as_str(),
            "https://app.example/api/sync/reports"
        );
    }

    #[test]
    fn test_trailing_slash_kept() {
        let url = with_trailing_slash(Url::parse("https://app.example/api/sync/").unwrap());
        assert_eq!(url.path(), "/api/sync/");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_recoverable() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let transmitter = HttpTransmitter::new(Url::parse("http://127.0.0.1:9/sync/").unwrap())
            .unwrap()
            .with_initial_backoff(Duration::from_millis(1));
        let record = PendingRecord::new(RecordKind::Report, json!({}));
        let err = transmitter.send(&record).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
