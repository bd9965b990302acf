//! Extraction pipeline: schema generation, extraction with grounding, and
//! quality control.

pub mod extract;
pub mod grounding;
pub mod prompts;
pub mod quality;
pub mod schema;

pub use extract::{
    is_pdf_url, parse_extraction_response, DataExtractor, ExtractOptions, ExtractionEvent,
    ExtractionStream,
};
pub use grounding::{
    alphanumeric_only, check_grounding, ground_datapoint, strip_markdown_links,
    text_fragment_source, GroundingCheck, NormalizedPage,
};
pub use quality::{control_quality, datapoint_rows, render_dataset_csv, QualityIssues};
pub use schema::generate_extraction_schema;
