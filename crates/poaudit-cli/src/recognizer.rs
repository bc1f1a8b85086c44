//! Recognition backends available to the CLI.

use std::time::Duration;

use async_trait::async_trait;
use poaudit_core::error::RecognitionError;
use poaudit_core::models::config::RecognitionConfig;
use poaudit_core::recognition::parse_payload;
use poaudit_core::{MediaType, PayloadRecognizer, RawExtraction, Recognizer};
use tracing::debug;

/// Posts document bytes to a recognition service and parses the JSON reply.
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

impl HttpRecognizer {
    pub fn new(endpoint: &str, config: &RecognitionConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timeout,
        })
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(
        &self,
        bytes: &[u8],
        media_type: &MediaType,
    ) -> Result<RawExtraction, RecognitionError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", media_type.as_mime())
            .body(bytes.to_vec());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Service(format!("HTTP {}: {}", status, body)));
        }

        let text = response.text().await.map_err(|e| self.map_error(e))?;
        debug!("Recognition service returned {} bytes", text.len());
        parse_payload(&text)
    }
}

impl HttpRecognizer {
    fn map_error(&self, e: reqwest::Error) -> RecognitionError {
        if e.is_timeout() {
            RecognitionError::Timeout(self.timeout.as_secs())
        } else {
            RecognitionError::Service(e.to_string())
        }
    }
}

/// Sends JSON payload files to the payload parser and everything else to the
/// remote service, when one is configured.
pub struct RoutingRecognizer {
    payload: PayloadRecognizer,
    remote: Option<HttpRecognizer>,
}

impl RoutingRecognizer {
    pub fn from_config(config: &RecognitionConfig) -> anyhow::Result<Self> {
        let remote = config
            .endpoint
            .as_deref()
            .map(|endpoint| HttpRecognizer::new(endpoint, config))
            .transpose()?;
        Ok(Self {
            payload: PayloadRecognizer::new(),
            remote,
        })
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

#[async_trait]
impl Recognizer for RoutingRecognizer {
    async fn recognize(
        &self,
        bytes: &[u8],
        media_type: &MediaType,
    ) -> Result<RawExtraction, RecognitionError> {
        match (media_type, &self.remote) {
            (MediaType::Json, _) => self.payload.recognize(bytes, media_type).await,
            (_, Some(remote)) => remote.recognize(bytes, media_type).await,
            (_, None) => Err(RecognitionError::UnsupportedMediaType(format!(
                "{} (no recognition endpoint configured)",
                media_type.as_mime()
            ))),
        }
    }
}
