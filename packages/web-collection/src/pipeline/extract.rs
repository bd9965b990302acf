//! Schema-driven data extraction from result pages.
//!
//! Each URL is turned into text (page fetcher, or OCR for PDFs), sent to the
//! model with the schema, and every returned record is validated and
//! grounded against that same text. A page whose answer is not JSON is
//! skipped; fetch, OCR and completion failures end the run.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::pin::Pin;
use tracing::{debug, info, warn};

use crate::error::{InputError, Result};
use crate::pipeline::grounding::{ground_datapoint, NormalizedPage};
use crate::pipeline::prompts::{extraction_instruction, format_extract_prompt, strip_code_fences};
use crate::traits::{completion::Completion, fetcher::PageFetcher, ocr::PdfTextExtractor};
use crate::types::datapoint::Datapoint;
use crate::types::schema::ExtractionSchema;

/// Lazily produced extraction events.
pub type ExtractionStream<'a> = Pin<Box<dyn Stream<Item = Result<ExtractionEvent>> + Send + 'a>>;

/// Extraction progress, in URL order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    /// A validated, grounded datapoint.
    Datapoint(Datapoint),

    /// Processing of a URL finished (including skipped URLs).
    UrlDone(String),
}

/// Options for one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Appended to the standard extraction instruction.
    pub extra_instruction: Option<String>,

    /// Run PDFs through OCR instead of skipping them.
    pub handle_pdfs: bool,
}

impl ExtractOptions {
    pub fn with_extra_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.extra_instruction = Some(instruction.into());
        self
    }

    pub fn with_handle_pdfs(mut self, handle_pdfs: bool) -> Self {
        self.handle_pdfs = handle_pdfs;
        self
    }
}

/// Whether a URL points at a PDF.
pub fn is_pdf_url(url: &str) -> bool {
    url.to_ascii_lowercase().contains(".pdf")
}

/// What one page produced.
enum PageOutcome {
    Skipped,
    Malformed,
    Datapoints(Vec<Datapoint>),
}

/// Extracts structured datapoints from pages.
pub struct DataExtractor<F: PageFetcher, C: Completion> {
    fetcher: F,
    completion: C,
    ocr: Option<Box<dyn PdfTextExtractor>>,
}

impl<F: PageFetcher, C: Completion> DataExtractor<F, C> {
    pub fn new(fetcher: F, completion: C) -> Self {
        Self {
            fetcher,
            completion,
            ocr: None,
        }
    }

    /// Enable OCR for PDF URLs.
    pub fn with_ocr(mut self, ocr: impl PdfTextExtractor + 'static) -> Self {
        self.ocr = Some(Box::new(ocr));
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn completion(&self) -> &C {
        &self.completion
    }

    /// Extract datapoints from every URL, in URL order.
    pub async fn extract(
        &self,
        urls: &[String],
        schema: &ExtractionSchema,
        options: &ExtractOptions,
    ) -> Result<Vec<Datapoint>> {
        let mut stream = self.extract_stream(urls, schema, options)?;
        let mut datapoints = Vec::new();
        while let Some(event) = stream.next().await {
            if let ExtractionEvent::Datapoint(datapoint) = event? {
                datapoints.push(datapoint);
            }
        }
        info!(urls = urls.len(), datapoints = datapoints.len(), "Extraction complete");
        Ok(datapoints)
    }

    /// Extract lazily, yielding datapoints as each page is processed and a
    /// [`ExtractionEvent::UrlDone`] after every URL.
    ///
    /// The schema and PDF settings are checked before the stream is
    /// returned. After an error the stream ends.
    pub fn extract_stream(
        &self,
        urls: &[String],
        schema: &ExtractionSchema,
        options: &ExtractOptions,
    ) -> Result<ExtractionStream<'_>> {
        schema.check()?;
        if options.handle_pdfs && self.ocr.is_none() && urls.iter().any(|u| is_pdf_url(u)) {
            return Err(InputError::MissingOcr.into());
        }

        let urls = urls.to_vec();
        let schema = schema.clone();
        let instruction = extraction_instruction(&schema.name, options.extra_instruction.as_deref());
        let json_schema = serde_json::to_string_pretty(&schema.json_schema())?;
        let handle_pdfs = options.handle_pdfs;

        Ok(Box::pin(stream! {
            for url in urls {
                let outcome = self
                    .process_url(&url, &schema, &instruction, &json_schema, handle_pdfs)
                    .await;
                match outcome {
                    Ok(PageOutcome::Datapoints(datapoints)) => {
                        for datapoint in datapoints {
                            yield Ok(ExtractionEvent::Datapoint(datapoint));
                        }
                    }
                    Ok(PageOutcome::Skipped) | Ok(PageOutcome::Malformed) => {}
                    Err(e) => {
                        warn!(url = %url, error = %e, "Extraction failed");
                        yield Err(e);
                        return;
                    }
                }
                yield Ok(ExtractionEvent::UrlDone(url));
            }
        }))
    }

    async fn page_text(&self, url: &str, handle_pdfs: bool) -> Result<Option<String>> {
        if !is_pdf_url(url) {
            return self.fetcher.fetch_markdown(url).await.map(Some);
        }
        if !handle_pdfs {
            debug!(url, "Skipping PDF");
            return Ok(None);
        }
        let ocr = self.ocr.as_ref().ok_or(InputError::MissingOcr)?;
        ocr.extract_text(url).await.map(Some)
    }

    async fn process_url(
        &self,
        url: &str,
        schema: &ExtractionSchema,
        instruction: &str,
        json_schema: &str,
        handle_pdfs: bool,
    ) -> Result<PageOutcome> {
        let Some(text) = self.page_text(url, handle_pdfs).await? else {
            return Ok(PageOutcome::Skipped);
        };
        if text.trim().is_empty() {
            warn!(url, "Page has no content");
            return Ok(PageOutcome::Skipped);
        }

        let prompt = format_extract_prompt(instruction, json_schema, &text);
        let response = self.completion.complete(&prompt).await?;

        let records = match parse_extraction_response(&response) {
            Ok(records) => records,
            Err(e) => {
                warn!(url, error = %e, "Model response is not JSON, skipping page");
                return Ok(PageOutcome::Malformed);
            }
        };

        let page = NormalizedPage::new(&text);
        let mut datapoints = Vec::with_capacity(records.len());
        for mut record in records {
            if is_truthy(record.get("error")) {
                debug!(url, "Dropping record flagged as error");
                continue;
            }
            if let Err(reason) = schema.validate(&mut record) {
                warn!(url, reason = %reason, "Dropping record that fails the schema");
                continue;
            }
            let mut datapoint = Datapoint::from_record(record, url);
            ground_datapoint(&mut datapoint, url, &page);
            datapoints.push(datapoint);
        }

        debug!(url, datapoints = datapoints.len(), "Page extracted");
        Ok(PageOutcome::Datapoints(datapoints))
    }
}

/// Parse a model answer into raw records.
///
/// Accepts a JSON array of objects or a single object, optionally inside
/// code fences. Array items that are not objects are ignored.
pub fn parse_extraction_response(
    content: &str,
) -> std::result::Result<Vec<Map<String, Value>>, serde_json::Error> {
    let value: Value = serde_json::from_str(strip_code_fences(content))?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect(),
        Value::Object(record) => vec![record],
        _ => Vec::new(),
    })
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectionError;
    use crate::testing::{MockCompletion, MockOcr, MockPageFetcher};
    use crate::types::schema::{FieldDescriptor, FieldType};
    use serde_json::json;

    fn schema() -> ExtractionSchema {
        ExtractionSchema::new(
            "CholeraCases",
            vec![
                FieldDescriptor::new("country", FieldType::Str, "Reporting country"),
                FieldDescriptor::new("cases", FieldType::Int, "Reported cases"),
            ],
        )
        .unwrap()
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_extraction_response_shapes() {
        let records = parse_extraction_response("```json\n[{\"a\": 1}, 2, {\"b\": 3}]\n```").unwrap();
        assert_eq!(records.len(), 2);

        let single = parse_extraction_response(r#"{"a": 1}"#).unwrap();
        assert_eq!(single.len(), 1);

        assert!(parse_extraction_response("\"text\"").unwrap().is_empty());
        assert!(parse_extraction_response("Sorry, I cannot help").is_err());
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!("parse failure"))));
    }

    #[tokio::test]
    async fn test_extract_validates_and_grounds() {
        let fetcher = MockPageFetcher::new().with_page(
            "https://who.int/sitrep",
            "Zambia reported **1,204** cholera cases this week.",
        );
        let completion = MockCompletion::new().with_response(
            "CholeraCases",
            r#"[
                {"country": "Zambia", "cases": "1,204", "grounding_quote": "Zambia reported 1,204 cholera cases", "error": false},
                {"country": "Malawi", "cases": 88, "grounding_quote": "Malawi reported 88"},
                {"country": "Kenya", "cases": "many", "grounding_quote": "x"},
                {"error": true}
            ]"#,
        );
        let extractor = DataExtractor::new(fetcher, completion);

        let datapoints = extractor
            .extract(&urls(&["https://who.int/sitrep"]), &schema(), &ExtractOptions::default())
            .await
            .unwrap();

        assert_eq!(datapoints.len(), 2);
        assert_eq!(datapoints[0].field("cases"), Some(&json!(1204)));
        assert!(datapoints[0].is_grounded);
        assert!(datapoints[0].source.starts_with("https://who.int/sitrep#:~:text=Zambia"));
        assert!(datapoints[0].field("error").is_none());
        assert!(!datapoints[1].is_grounded);
        assert_eq!(datapoints[1].source, "https://who.int/sitrep");

        let prompts = extractor.completion().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("extract all mentioned CholeraCases"));
        assert!(prompts[0].contains("grounding_quote"));
    }

    #[tokio::test]
    async fn test_stream_reports_every_url() {
        let fetcher = MockPageFetcher::new()
            .with_page("https://a.com", "Chad: 10 cases")
            .with_page("https://b.com", "nothing here");
        let completion = MockCompletion::new()
            .with_response("Chad", r#"[{"country": "Chad", "cases": 10, "grounding_quote": "Chad: 10 cases"}]"#)
            .with_response("nothing here", "I could not find anything.");
        let extractor = DataExtractor::new(fetcher, completion);

        let events: Vec<_> = extractor
            .extract_stream(
                &urls(&["https://a.com", "https://x.org/report.pdf", "https://b.com"]),
                &schema(),
                &ExtractOptions::default(),
            )
            .unwrap()
            .collect()
            .await;

        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], ExtractionEvent::Datapoint(d) if d.is_grounded));
        assert_eq!(events[1], ExtractionEvent::UrlDone("https://a.com".into()));
        assert_eq!(events[2], ExtractionEvent::UrlDone("https://x.org/report.pdf".into()));
        assert_eq!(events[3], ExtractionEvent::UrlDone("https://b.com".into()));
        assert_eq!(extractor.fetcher().fetched(), urls(&["https://a.com", "https://b.com"]));
    }

    #[tokio::test]
    async fn test_pdfs_need_ocr_when_handled() {
        let extractor = DataExtractor::new(MockPageFetcher::new(), MockCompletion::new());
        let options = ExtractOptions::default().with_handle_pdfs(true);

        let err = extractor
            .extract(&urls(&["https://x.org/a.PDF"]), &schema(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::Input(InputError::MissingOcr)));
    }

    #[tokio::test]
    async fn test_pdf_text_comes_from_ocr() {
        let completion = MockCompletion::new().with_response(
            "Table 1",
            r#"[{"country": "Haiti", "cases": 7, "grounding_quote": "Haiti 7"}]"#,
        );
        let extractor = DataExtractor::new(MockPageFetcher::new(), completion)
            .with_ocr(MockOcr::new().with_text("https://x.org/a.pdf", "Table 1\n| Haiti | 7 |"));
        let options = ExtractOptions::default().with_handle_pdfs(true);

        let datapoints = extractor
            .extract(&urls(&["https://x.org/a.pdf"]), &schema(), &options)
            .await
            .unwrap();

        assert_eq!(datapoints.len(), 1);
        assert!(datapoints[0].is_grounded);
        assert!(extractor.fetcher().fetched().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_run() {
        let fetcher = MockPageFetcher::new().fail_on("https://down.com");
        let extractor = DataExtractor::new(fetcher, MockCompletion::new());

        let err = extractor
            .extract(&urls(&["https://down.com", "https://a.com"]), &schema(), &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::Fetch { .. }));
        assert_eq!(extractor.fetcher().fetched(), urls(&["https://down.com"]));
    }
}
