//! Configuration for the remote collaborators.
//!
//! Each config has builder-style setters and a `from_env()` constructor. API
//! keys are held as [`SecretString`] and never printed.

use std::env;

use crate::error::{CollectionError, Result};
use crate::security::SecretString;

fn required_key(var: &str) -> Result<SecretString> {
    SecretString::from_env(var).ok_or_else(|| CollectionError::Config(format!("{var} must be set")))
}

fn optional_var(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Completion (LLM) provider settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier, e.g. `gpt-4.1`.
    pub model: String,

    /// API key; `None` for local OpenAI-compatible servers.
    pub api_key: Option<SecretString>,

    /// Sampling temperature (`None` leaves the provider default).
    pub temperature: Option<f32>,

    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            api_key: None,
            temperature: Some(0.2),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl LlmConfig {
    /// Create a config for a model with default temperature.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Load from `OPENAI_API_KEY`, `LLM_MODEL`, `LLM_TEMPERATURE`, `LLM_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            api_key: SecretString::from_env("OPENAI_API_KEY"),
            ..Default::default()
        };
        if let Some(model) = optional_var("LLM_MODEL") {
            config.model = model;
        }
        if let Some(temperature) = optional_var("LLM_TEMPERATURE") {
            let parsed = temperature.parse().map_err(|_| {
                CollectionError::Config(format!("LLM_TEMPERATURE must be a number, got '{temperature}'"))
            })?;
            config.temperature = Some(parsed);
        }
        if let Some(base_url) = optional_var("LLM_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key));
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Bright Data SERP proxy settings.
#[derive(Debug, Clone)]
pub struct BrightDataConfig {
    pub api_key: SecretString,

    /// Zone identifier the requests are billed against.
    pub zone: String,

    pub base_url: String,
}

impl BrightDataConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.brightdata.com/request";

    pub fn new(api_key: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            zone: zone.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Load from `BRIGHT_DATA_API_KEY`, `BRIGHT_DATA_ZONE`, `BRIGHT_DATA_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let zone = optional_var("BRIGHT_DATA_ZONE")
            .ok_or_else(|| CollectionError::Config("BRIGHT_DATA_ZONE must be set".into()))?;
        Ok(Self {
            api_key: required_key("BRIGHT_DATA_API_KEY")?,
            zone,
            base_url: optional_var("BRIGHT_DATA_BASE_URL")
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Jina reranker settings.
#[derive(Debug, Clone)]
pub struct JinaConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl JinaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            model: "jina-reranker-v2-base-multilingual".to_string(),
            base_url: "https://api.jina.ai/v1/rerank".to_string(),
        }
    }

    /// Load from `JINA_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_key("JINA_API_KEY")?,
            ..Self::new("")
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Mistral OCR settings, used for PDF pages.
#[derive(Debug, Clone)]
pub struct MistralOcrConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl MistralOcrConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            model: "mistral-ocr-latest".to_string(),
            base_url: "https://api.mistral.ai/v1/ocr".to_string(),
        }
    }

    /// Load from `MISTRAL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_key("MISTRAL_API_KEY")?,
            ..Self::new("")
        })
    }
}

/// Firecrawl settings for the page fetcher.
#[derive(Debug, Clone)]
pub struct FirecrawlConfig {
    pub api_key: SecretString,
    pub base_url: String,

    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

impl FirecrawlConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key),
            base_url: "https://api.firecrawl.dev/v1".to_string(),
            timeout_secs: 120,
        }
    }

    /// Load from `FIRECRAWL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_key("FIRECRAWL_API_KEY")?,
            ..Self::new("")
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
