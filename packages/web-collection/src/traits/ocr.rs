//! PDF text extraction.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BoxError, CollectionError, Result};
use crate::types::config::MistralOcrConfig;

/// Turns a PDF URL into text.
#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    async fn extract_text(&self, url: &str) -> Result<String>;
}

/// Mistral OCR client.
///
/// Pages come back as markdown and are joined with newlines.
pub struct MistralOcr {
    client: Client,
    config: MistralOcrConfig,
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument<'a>,
    include_image_base64: bool,
}

#[derive(Serialize)]
struct OcrDocument<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    document_url: &'a str,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Deserialize)]
struct OcrPage {
    #[serde(default)]
    markdown: String,
}

impl OcrResponse {
    fn into_text(self) -> String {
        self.pages
            .into_iter()
            .map(|p| p.markdown)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl MistralOcr {
    pub fn new(config: MistralOcrConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Create from `MISTRAL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(MistralOcrConfig::from_env()?))
    }

    fn ocr_error(url: &str, source: impl Into<BoxError>) -> CollectionError {
        CollectionError::Ocr {
            url: url.to_string(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl PdfTextExtractor for MistralOcr {
    async fn extract_text(&self, url: &str) -> Result<String> {
        let request = OcrRequest {
            model: &self.config.model,
            document: OcrDocument {
                kind: "document_url",
                document_url: url,
            },
            include_image_base64: false,
        };

        debug!(url, model = %self.config.model, "Running OCR");

        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", self.config.api_key.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::ocr_error(url, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::ocr_error(
                url,
                format!("Mistral OCR error: {} - {}", status, text),
            ));
        }

        let body: OcrResponse = response.json().await.map_err(|e| Self::ocr_error(url, e))?;
        debug!(url, pages = body.pages.len(), "OCR complete");
        Ok(body.into_text())
    }
}
