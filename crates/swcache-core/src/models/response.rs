use serde::{Deserialize, Serialize};

use super::Headers;

/// Classification of a response relative to the worker origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response with full access to headers and body.
    #[default]
    Basic,
    /// Cross-origin response obtained with CORS.
    Cors,
    /// Cross-origin `no-cors` response.
    Opaque,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default, rename = "type")]
    pub response_type: ResponseType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: String::new(),
            response_type: ResponseType::Basic,
            url: None,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body).with_status_text("OK")
    }

    /// A network error response (status 0)
    pub fn error() -> Self {
        Self::new(0, Vec::new()).with_type(ResponseType::Error)
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Status in the 200-299 range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Only a plain 200 from the worker's own origin is stored on the fetch path.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cacheable_requires_200_basic() {
        assert!(Response::ok("hi").is_cacheable());
        assert!(!Response::new(201, "hi").is_cacheable());
        assert!(!Response::new(404, "").is_cacheable());
        assert!(!Response::ok("hi").with_type(ResponseType::Cors).is_cacheable());
        assert!(!Response::ok("hi").with_type(ResponseType::Opaque).is_cacheable());
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error();
        assert_eq!(resp.status, 0);
        assert_eq!(resp.response_type, ResponseType::Error);
        assert!(!resp.is_success());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = Response::ok("").with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let resp: Response = serde_json::from_str(r#"{"status": 204}"#).unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(resp.response_type, ResponseType::Basic);
        assert!(resp.body.is_empty());
    }
}
