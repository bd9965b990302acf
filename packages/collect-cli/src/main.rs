//! `collect` - command-line front end for web data collection.
//!
//! Results are printed as JSON on stdout; logs and progress go to stderr.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web_collection::{
    control_quality, datapoint_rows, flatten_results, generate_extraction_schema,
    generate_search_queries, rerank_results, url_date, CountryAssignment, DataExtractor, Datapoint,
    ExtractOptions, ExtractionEvent, ExtractionSchema, HtmlDateExtractor, RetrievalRequest,
    Retriever, VariableSet,
};

use config::CountryFiles;

#[derive(Parser)]
#[command(name = "collect")]
#[command(about = "Collect grounded datasets from web search results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate search queries (or templates) for a dataset description
    Queries {
        #[arg(long)]
        description: String,
        #[arg(long, default_value_t = 5)]
        num: usize,
        /// Template variable to include as a placeholder (repeatable)
        #[arg(long = "variable")]
        variables: Vec<String>,
    },

    /// Retrieve deduplicated search results for query templates
    Retrieve(RetrieveArgs),

    /// Generate an extraction schema
    Schema {
        #[arg(long)]
        description: String,
        /// Field the schema must cover (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,
    },

    /// Extract grounded datapoints from pages
    Extract(ExtractArgs),

    /// Flag suspicious rows in a collected dataset
    Quality {
        /// JSON array of datapoints
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        description: String,
    },

    /// Rerank texts against the queries that found them
    Rerank {
        /// JSON array of `{"query": ..., "text": ...}` objects
        #[arg(long)]
        input: PathBuf,
    },

    /// List countries with known geolocation codes or Media Cloud sources
    Countries {
        /// List Media Cloud countries instead of geolocation countries
        #[arg(long)]
        media_cloud: bool,
        #[command(flatten)]
        files: CountryFileArgs,
    },

    /// Find the publication date of a page
    Date {
        url: String,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
}

#[derive(Args)]
struct CountryFileArgs {
    /// Country name to geolocation code JSON
    #[arg(long)]
    country_codes: Option<PathBuf>,
    /// Country name to Media Cloud outlets JSON
    #[arg(long)]
    media_cloud_sources: Option<PathBuf>,
}

impl From<CountryFileArgs> for CountryFiles {
    fn from(args: CountryFileArgs) -> Self {
        Self {
            codes: args.country_codes,
            sources: args.media_cloud_sources,
        }
    }
}

#[derive(Args)]
struct RetrieveArgs {
    /// Query or query template (repeatable)
    #[arg(long = "template", required = true)]
    templates: Vec<String>,
    #[arg(long, default_value_t = 1)]
    pages: usize,
    /// Template variable as `name=value1,value2` (repeatable)
    #[arg(long = "var", value_parser = parse_variable)]
    variables: Vec<(String, Vec<String>)>,
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long)]
    time_chunking: bool,
    #[arg(long)]
    media_cloud_country: Option<String>,
    #[arg(long)]
    geolocation_country: Option<String>,
    #[arg(long)]
    news_only: bool,
    /// Variable whose values select per-query countries
    #[arg(long)]
    assign_variable: Option<String>,
    /// `value=Country` Media Cloud assignment (repeatable)
    #[arg(long = "assign-media-cloud", value_parser = parse_pair)]
    assign_media_cloud: Vec<(String, String)>,
    /// `value=Country` geolocation assignment (repeatable)
    #[arg(long = "assign-geolocation", value_parser = parse_pair)]
    assign_geolocation: Vec<(String, String)>,
    /// Print results as JSON lines while they arrive
    #[arg(long)]
    stream: bool,
    #[command(flatten)]
    files: CountryFileArgs,
}

#[derive(Args)]
struct ExtractArgs {
    /// Extraction schema JSON (`{name, fields}`)
    #[arg(long)]
    schema: PathBuf,
    /// Page URL (repeatable)
    #[arg(long = "url")]
    urls: Vec<String>,
    /// File with one URL per line
    #[arg(long)]
    urls_file: Option<PathBuf>,
    /// Appended to the extraction instruction
    #[arg(long)]
    instruction: Option<String>,
    /// OCR PDF URLs instead of skipping them
    #[arg(long)]
    handle_pdfs: bool,
    /// Print datapoints as JSON lines while pages complete
    #[arg(long)]
    stream: bool,
}

/// Quality input: `extract` output, or any list of flat JSON rows.
#[derive(Deserialize)]
#[serde(untagged)]
enum QualityInput {
    Datapoints(Vec<Datapoint>),
    Rows(Vec<Map<String, Value>>),
}

#[derive(Deserialize)]
struct RerankInput {
    query: String,
    text: String,
}

#[derive(Serialize)]
struct PublicationDate<'a> {
    url: &'a str,
    date: Option<String>,
}

fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn parse_variable(raw: &str) -> std::result::Result<(String, Vec<String>), String> {
    let (name, values) = parse_pair(raw)?;
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok((name, values))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_json_line<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,web_collection=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Queries {
            description,
            num,
            variables,
        } => cmd_queries(&description, num, &variables).await,
        Commands::Retrieve(args) => cmd_retrieve(args).await,
        Commands::Schema {
            description,
            fields,
        } => cmd_schema(&description, &fields).await,
        Commands::Extract(args) => cmd_extract(args).await,
        Commands::Quality { data, description } => cmd_quality(&data, &description).await,
        Commands::Rerank { input } => cmd_rerank(&input).await,
        Commands::Countries { media_cloud, files } => cmd_countries(media_cloud, files.into()),
        Commands::Date { url, timeout_secs } => cmd_date(&url, timeout_secs).await,
    }
}

async fn cmd_queries(description: &str, num: usize, variables: &[String]) -> Result<()> {
    let completion = config::completion()?;
    let names = (!variables.is_empty()).then_some(variables);
    let queries = generate_search_queries(description, num, &completion, names)
        .await
        .context("Query generation failed")?;
    print_json(&queries)
}

async fn cmd_retrieve(args: RetrieveArgs) -> Result<()> {
    let catalog = CountryFiles::from(args.files).load()?;
    let retriever = Retriever::new(config::search_proxy()?, catalog);

    let mut request = RetrievalRequest::new(args.templates, args.pages)
        .with_time_chunking(args.time_chunking)
        .with_news_only(args.news_only);
    if !args.variables.is_empty() {
        request = request.with_variables(args.variables.into_iter().collect::<VariableSet>());
    }
    if let Some(date) = args.start_date {
        request = request.with_start_date(date);
    }
    if let Some(date) = args.end_date {
        request = request.with_end_date(date);
    }
    if let Some(country) = args.media_cloud_country {
        request = request.with_media_cloud_country(country);
    }
    if let Some(country) = args.geolocation_country {
        request = request.with_geolocation_country(country);
    }
    if let Some(variable) = args.assign_variable {
        let mut assignment = CountryAssignment::new(variable);
        for (value, country) in args.assign_media_cloud {
            assignment = assignment.with_media_cloud_country(value, country);
        }
        for (value, country) in args.assign_geolocation {
            assignment = assignment.with_geolocation_country(value, country);
        }
        request = request.with_country_assignment(assignment);
    } else if !args.assign_media_cloud.is_empty() || !args.assign_geolocation.is_empty() {
        anyhow::bail!("--assign-media-cloud and --assign-geolocation need --assign-variable");
    }

    if args.stream {
        let mut stream = retriever.retrieve_stream(&request)?;
        let mut count = 0usize;
        while let Some(item) = stream.next().await {
            print_json_line(&item.context("Retrieval failed")?)?;
            count += 1;
        }
        eprintln!("{} {} unique results", "✓".bright_green(), count);
        return Ok(());
    }

    let results = retriever.retrieve(&request).await.context("Retrieval failed")?;
    let rows = flatten_results(&results);
    eprintln!("{} {} unique results", "✓".bright_green(), rows.len());
    print_json(&rows)
}

async fn cmd_schema(description: &str, fields: &[String]) -> Result<()> {
    let completion = config::completion()?;
    let schema = generate_extraction_schema(description, fields, &completion)
        .await
        .context("Schema generation failed")?;
    print_json(&schema)
}

fn read_urls(args: &ExtractArgs) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(path) = &args.urls_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    if urls.is_empty() {
        anyhow::bail!("no URLs given; use --url or --urls-file");
    }
    Ok(urls)
}

async fn cmd_extract(args: ExtractArgs) -> Result<()> {
    let schema: ExtractionSchema = read_json(&args.schema)?;
    let urls = read_urls(&args)?;

    let mut extractor = DataExtractor::new(config::fetcher()?, config::completion()?);
    if args.handle_pdfs {
        extractor = extractor.with_ocr(config::ocr()?);
    }

    let mut options = ExtractOptions::default().with_handle_pdfs(args.handle_pdfs);
    if let Some(instruction) = args.instruction {
        options = options.with_extra_instruction(instruction);
    }

    if args.stream {
        let mut stream = extractor.extract_stream(&urls, &schema, &options)?;
        while let Some(event) = stream.next().await {
            match event.context("Extraction failed")? {
                ExtractionEvent::Datapoint(datapoint) => print_json_line(&datapoint)?,
                ExtractionEvent::UrlDone(url) => eprintln!("{} {}", "✓".bright_green(), url),
            }
        }
        return Ok(());
    }

    let datapoints = extractor
        .extract(&urls, &schema, &options)
        .await
        .context("Extraction failed")?;
    let grounded = datapoints.iter().filter(|d| d.is_grounded).count();
    eprintln!(
        "{} {} datapoints ({} grounded) from {} URLs",
        "✓".bright_green(),
        datapoints.len(),
        grounded,
        urls.len()
    );
    print_json(&datapoints)
}

async fn cmd_quality(data: &Path, description: &str) -> Result<()> {
    let rows = match read_json::<QualityInput>(data)? {
        QualityInput::Datapoints(datapoints) => datapoint_rows(&datapoints)?,
        QualityInput::Rows(rows) => rows,
    };
    let completion = config::completion()?;
    let issues = control_quality(&rows, description, &completion)
        .await
        .context("Quality control failed")?;

    let flagged = issues.values().filter(|issue| issue.as_str() != "NA").count();
    eprintln!("{} {} of {} rows flagged", "!".bright_yellow(), flagged, rows.len());
    print_json(&issues)
}

async fn cmd_rerank(input: &Path) -> Result<()> {
    let items: Vec<RerankInput> = read_json(input)?;
    let (queries, documents): (Vec<String>, Vec<String>) =
        items.into_iter().map(|i| (i.query, i.text)).unzip();

    let reranker = config::reranker()?;
    let ranked = rerank_results(&reranker, &queries, &documents)
        .await
        .context("Reranking failed")?;
    print_json(&ranked)
}

fn cmd_countries(media_cloud: bool, files: CountryFiles) -> Result<()> {
    let catalog = files.load()?;
    let names = if media_cloud {
        catalog.media_cloud_countries()
    } else {
        catalog.geolocation_countries()
    };
    print_json(&names)
}

async fn cmd_date(url: &str, timeout_secs: u64) -> Result<()> {
    let extractor = HtmlDateExtractor::new();
    let date = url_date(&extractor, url, Duration::from_secs(timeout_secs)).await;
    if date.is_none() {
        eprintln!("{} no publication date found for {}", "✗".bright_red(), url);
    }
    print_json(&PublicationDate {
        url,
        date: date.map(|d| d.format("%Y-%m-%d").to_string()),
    })
}
