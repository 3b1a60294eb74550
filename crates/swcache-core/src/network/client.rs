//! HTTP implementation of the worker's network access.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Result, WorkerError};
use crate::models::{same_origin, Headers, Request, RequestMode, Response, ResponseType};

use super::Network;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Network access over HTTP(S).
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
    origin: Url,
}

impl HttpNetwork {
    /// `origin` decides which responses count as same-origin (`basic`).
    pub fn new(origin: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| WorkerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, origin })
    }

    /// Share the connection pool with another origin.
    pub fn with_origin(&self, origin: Url) -> Self {
        Self {
            client: self.client.clone(),
            origin,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn send(&self, mut request: Request) -> Result<Response> {
        if request.mode() == RequestMode::SameOrigin && !same_origin(&self.origin, request.url()) {
            return Err(WorkerError::NetworkUnavailable(format!(
                "Cross-origin request in same-origin mode: {}",
                request.url()
            )));
        }

        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.take_body() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| WorkerError::NetworkUnavailable(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().clone();
        let response_type = classify(&self.origin, &final_url, request.mode());
        debug!(url = %final_url, status = status.as_u16(), ?response_type, "Network response");

        if response_type == ResponseType::Opaque {
            // Opaque responses expose neither status, headers nor body
            return Ok(Response::new(0, Vec::new())
                .with_type(ResponseType::Opaque)
                .with_url(final_url));
        }

        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::NetworkUnavailable(e.to_string()))?;

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type,
            url: Some(final_url.into()),
            headers,
            body: body.to_vec(),
        })
    }
}

impl Network for HttpNetwork {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response>> {
        Box::pin(self.send(request))
    }
}

/// Classify a response by where it finally came from.
fn classify(origin: &Url, final_url: &Url, mode: RequestMode) -> ResponseType {
    if same_origin(origin, final_url) {
        ResponseType::Basic
    } else if mode == RequestMode::NoCors {
        ResponseType::Opaque
    } else {
        ResponseType::Cors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_classify_same_origin_is_basic() {
        let origin = url("https://app.example");
        for mode in [RequestMode::Navigate, RequestMode::Cors, RequestMode::NoCors] {
            assert_eq!(
                classify(&origin, &url("https://app.example/index.html"), mode),
                ResponseType::Basic
            );
        }
    }

    #[test]
    fn test_classify_cross_origin() {
        let origin = url("https://app.example");
        let cdn = url("https://cdn.example/lib.js");
        assert_eq!(classify(&origin, &cdn, RequestMode::Cors), ResponseType::Cors);
        assert_eq!(classify(&origin, &cdn, RequestMode::NoCors), ResponseType::Opaque);
    }

    #[tokio::test]
    async fn test_same_origin_mode_rejects_cross_origin() {
        let network = HttpNetwork::new(url("https://app.example")).unwrap();
        let request = Request::get(url("https://cdn.example/x.js")).with_mode(RequestMode::SameOrigin);
        let err = network.fetch(request).await.unwrap_err();
        assert!(err.is_network());
    }
}
