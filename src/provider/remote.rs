//! Remote face encoder client.
//!
//! Talks to a sidecar encoder service over HTTP. The sidecar wraps the
//! actual face detection model; this client only moves bytes and decodes
//! the response.

use super::FaceEncoder;
use crate::models::{DetectedFace, FaceBox};
use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One detected face in the sidecar response.
#[derive(Debug, Deserialize)]
struct EncodingResponse {
    #[serde(rename = "box")]
    location: ResponseBox,
    embedding: Vec<f32>,
}

/// Face box in the sidecar response.
#[derive(Debug, Deserialize)]
struct ResponseBox {
    top: u32,
    right: u32,
    bottom: u32,
    left: u32,
}

/// HTTP client for a face encoder sidecar.
///
/// # Example
///
/// ```rust,ignore
/// use visage::provider::RemoteEncoder;
///
/// let encoder = RemoteEncoder::new("http://localhost:8100")
///     .with_timeout(std::time::Duration::from_secs(10));
/// let faces = encoder.detect_and_encode(&image_bytes)?;
/// ```
pub struct RemoteEncoder {
    /// Base URL of the sidecar service.
    base_url: String,
    /// Embedding dimensions the sidecar model produces.
    dimensions: usize,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl RemoteEncoder {
    /// Default embedding dimensions (dlib face recognition model).
    pub const DEFAULT_DIMENSIONS: usize = 128;

    /// Creates a new client for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dimensions: Self::DEFAULT_DIMENSIONS,
            client: build_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Sets the expected embedding dimensions.
    #[must_use]
    pub const fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

/// Builds the blocking HTTP client.
fn build_client(timeout: Duration) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

impl FaceEncoder for RemoteEncoder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn detect_and_encode(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>> {
        let url = format!("{}/encodings", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(image_bytes.to_vec())
            .send()
            .map_err(|e| Error::Provider(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "encoder returned {status} for {url}"
            )));
        }

        let encodings: Vec<EncodingResponse> = response
            .json()
            .map_err(|e| Error::Provider(format!("invalid encoder response: {e}")))?;

        let faces = encodings
            .into_iter()
            .map(|e| {
                if e.embedding.len() != self.dimensions {
                    return Err(Error::Provider(format!(
                        "encoder returned {}-dim embedding, expected {}",
                        e.embedding.len(),
                        self.dimensions
                    )));
                }
                Ok(DetectedFace {
                    location: FaceBox {
                        top: e.location.top,
                        right: e.location.right,
                        bottom: e.location.bottom,
                        left: e.location.left,
                    },
                    embedding: e.embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(faces = faces.len(), "encoder response decoded");
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let encoder = RemoteEncoder::new("http://localhost:8100/");
        assert_eq!(encoder.base_url, "http://localhost:8100");
    }

    #[test]
    fn test_default_dimensions() {
        let encoder = RemoteEncoder::new("http://localhost:8100");
        assert_eq!(encoder.dimensions(), 128);

        let encoder = encoder.with_dimensions(512);
        assert_eq!(encoder.dimensions(), 512);
    }

    #[test]
    fn test_unreachable_endpoint_is_provider_error() {
        // Port 1 is never listening.
        let encoder = RemoteEncoder::new("http://127.0.0.1:1")
            .with_timeout(Duration::from_millis(200));
        let result = encoder.detect_and_encode(b"bytes");
        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"[{"box": {"top": 1, "right": 20, "bottom": 21, "left": 0}, "embedding": [0.1, 0.2]}]"#;
        let parsed: Vec<EncodingResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].location.right, 20);
        assert_eq!(parsed[0].embedding.len(), 2);
    }
}
