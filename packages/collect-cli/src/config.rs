//! Collaborator construction from the environment.
//!
//! Credentials come from process env, with `.env` loaded first by `main`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use web_collection::{
    BrightDataConfig, BrightDataProxy, CountryCatalog, FirecrawlFetcher, JinaReranker, MistralOcr,
    OpenAiCompletion,
};

/// Optional country data override, in place of the bundled JSON.
#[derive(Debug, Clone, Default)]
pub struct CountryFiles {
    pub codes: Option<PathBuf>,
    pub sources: Option<PathBuf>,
}

impl CountryFiles {
    pub fn load(&self) -> Result<Arc<CountryCatalog>> {
        let catalog = match (&self.codes, &self.sources) {
            (Some(codes), Some(sources)) => CountryCatalog::from_files(codes, sources)
                .with_context(|| format!("Failed to load country data from {}", codes.display()))?,
            (None, None) => CountryCatalog::bundled().context("Failed to load bundled country data")?,
            _ => anyhow::bail!("--country-codes and --media-cloud-sources must be given together"),
        };
        Ok(Arc::new(catalog))
    }
}

pub fn search_proxy() -> Result<BrightDataProxy> {
    let config = BrightDataConfig::from_env().context("Bright Data is not configured")?;
    tracing::debug!(zone = %config.zone, "Search proxy configured");
    Ok(BrightDataProxy::new(config))
}

pub fn completion() -> Result<OpenAiCompletion> {
    let completion = OpenAiCompletion::from_env().context("LLM is not configured")?;
    tracing::debug!(model = completion.model(), "Completion client configured");
    Ok(completion)
}

pub fn fetcher() -> Result<FirecrawlFetcher> {
    FirecrawlFetcher::from_env().context("Firecrawl is not configured")
}

pub fn ocr() -> Result<MistralOcr> {
    MistralOcr::from_env().context("Mistral OCR is not configured")
}

pub fn reranker() -> Result<JinaReranker> {
    JinaReranker::from_env().context("Jina reranker is not configured")
}
