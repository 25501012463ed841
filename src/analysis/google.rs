//! Google Cloud Vision client for the `images:annotate` REST endpoint.
//!
//! Text comes from `TEXT_DETECTION` (the first annotation holds the full
//! text block), object labels from `OBJECT_LOCALIZATION`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::oracle::VisionOracle;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ConfigError};
use crate::video::types::Frame;

const TEXT_DETECTION: &str = "TEXT_DETECTION";
const OBJECT_LOCALIZATION: &str = "OBJECT_LOCALIZATION";
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<ImageRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: Vec<Feature<'a>>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    localized_object_annotations: Vec<LocalizedObject>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct LocalizedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

pub struct GoogleVisionOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleVisionOracle {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AnalysisError::Unreachable {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Build a client from config, reading the API key from the configured environment variable
    pub fn from_config(config: &AnalysisConfig) -> crate::error::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey { key: config.api_key_env.clone() })?;

        Ok(Self::new(config.endpoint.clone(), api_key)?)
    }

    async fn annotate(&self, frame: &Frame, feature: &str) -> Result<ImageResponse, AnalysisError> {
        let jpeg = frame.to_jpeg_bytes(JPEG_QUALITY).map_err(|e| AnalysisError::FrameEncoding {
            reason: e.to_string(),
        })?;

        let request = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent { content: BASE64.encode(jpeg) },
                features: vec![Feature { kind: feature }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Unreachable { reason: e.to_string() })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Unreachable { reason: e.to_string() })?;

        if !status.is_success() {
            return Err(AnalysisError::Rejected {
                reason: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        debug!("{} response: {} bytes", feature, body.len());
        parse_response(&body)
    }
}

/// Extract the single image response, surfacing per-image errors
fn parse_response(body: &str) -> Result<ImageResponse, AnalysisError> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::MalformedResponse { reason: e.to_string() })?;

    let response = parsed.responses.into_iter().next().ok_or_else(|| AnalysisError::MalformedResponse {
        reason: "response contains no image results".to_string(),
    })?;

    if let Some(status) = &response.error {
        return Err(AnalysisError::Rejected {
            reason: format!("code {}: {}", status.code, status.message),
        });
    }

    Ok(response)
}

fn full_text(response: &ImageResponse) -> String {
    response
        .text_annotations
        .first()
        .map(|annotation| annotation.description.clone())
        .unwrap_or_default()
}

fn object_labels(response: &ImageResponse) -> BTreeSet<String> {
    response
        .localized_object_annotations
        .iter()
        .map(|object| object.name.clone())
        .collect()
}

#[async_trait]
impl VisionOracle for GoogleVisionOracle {
    fn name(&self) -> &str {
        "google-vision"
    }

    async fn detect_text(&self, frame: &Frame) -> Result<String, AnalysisError> {
        let response = self.annotate(frame, TEXT_DETECTION).await?;
        Ok(full_text(&response))
    }

    async fn detect_objects(&self, frame: &Frame) -> Result<BTreeSet<String>, AnalysisError> {
        let response = self.annotate(frame, OBJECT_LOCALIZATION).await?;
        Ok(object_labels(&response))
    }
}
