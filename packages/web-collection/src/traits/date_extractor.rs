//! Publication date lookup for result pages.
//!
//! Date extraction is best effort: a slow page or a page without a
//! recognizable date simply yields no date. [`url_date`] enforces a hard
//! wall-clock limit around any extractor.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CollectionError, Result};

/// Default limit for one date lookup.
pub const DEFAULT_DATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Earliest year accepted as a publication date.
const MIN_YEAR: i32 = 1990;

/// Meta tag names/properties that carry a publication date, most specific first.
const DATE_META_KEYS: &[&str] = &[
    "article:published_time",
    "og:published_time",
    "datepublished",
    "publishdate",
    "pubdate",
    "publication_date",
    "sailthru.date",
    "parsely-pub-date",
    "dc.date.issued",
    "dc.date",
    "date",
];

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})").unwrap());

static URL_PATH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})/(\d{1,2})/(\d{1,2})(?:/|$)|(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Looks up the publication date of a page.
#[async_trait]
pub trait DateExtractor: Send + Sync {
    async fn publication_date(&self, url: &str) -> Result<Option<NaiveDate>>;
}

/// Fetches the page HTML and reads the date from markup, falling back to the URL.
pub struct HtmlDateExtractor {
    client: Client,
}

impl Default for HtmlDateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlDateExtractor {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DateExtractor for HtmlDateExtractor {
    async fn publication_date(&self, url: &str) -> Result<Option<NaiveDate>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CollectionError::Fetch {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Date lookup got non-success status");
            return Ok(date_from_url(url));
        }

        let html = response.text().await.map_err(|e| CollectionError::Fetch {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        Ok(find_date(&html, url))
    }
}

/// Best publication date found in `html`, else in `url`.
///
/// Sources are tried in order: date meta tags (most specific key wins),
/// JSON-LD `datePublished`, `<time datetime>`, then the URL path.
pub fn find_date(html: &str, url: &str) -> Option<NaiveDate> {
    let document = Html::parse_document(html);

    date_from_meta(&document)
        .or_else(|| date_from_json_ld(&document))
        .or_else(|| date_from_time(&document))
        .or_else(|| date_from_url(url))
}

fn date_from_meta(document: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse("meta[property], meta[name], meta[itemprop]").ok()?;
    let mut best: Option<(usize, NaiveDate)> = None;

    for meta in document.select(&selector) {
        let element = meta.value();
        let Some(content) = element.attr("content") else {
            continue;
        };
        let Some(rank) = ["property", "name", "itemprop"]
            .iter()
            .filter_map(|attr| element.attr(attr))
            .filter_map(|key| {
                let key = key.trim().to_ascii_lowercase();
                DATE_META_KEYS.iter().position(|k| *k == key)
            })
            .min()
        else {
            continue;
        };
        if best.is_some_and(|(r, _)| r <= rank) {
            continue;
        }
        if let Some(date) = parse_date_prefix(content) {
            best = Some((rank, date));
        }
    }

    best.map(|(_, date)| date)
}

fn date_from_json_ld(document: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let text: String = script.text().collect();
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value) => published_in(&value),
            Err(e) => {
                debug!(error = %e, "Skipping unparseable JSON-LD block");
                None
            }
        }
    })
}

/// First `datePublished` in a JSON-LD value, searching `@graph` and arrays.
fn published_in(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Object(map) => map
            .get("datePublished")
            .and_then(Value::as_str)
            .and_then(parse_date_prefix)
            .or_else(|| map.values().find_map(published_in)),
        Value::Array(items) => items.iter().find_map(published_in),
        _ => None,
    }
}

fn date_from_time(document: &Html) -> Option<NaiveDate> {
    let selector = Selector::parse("time[datetime]").ok()?;

    document
        .select(&selector)
        .filter_map(|time| time.value().attr("datetime"))
        .find_map(parse_date_prefix)
}

/// Date encoded in a URL path (`/2021/03/14/` or `2021-03-14`).
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    URL_PATH_DATE.captures_iter(url).find_map(|c| {
        let (y, m, d) = match (c.get(1), c.get(2), c.get(3)) {
            (Some(y), Some(m), Some(d)) => (y, m, d),
            _ => (c.get(4)?, c.get(5)?, c.get(6)?),
        };
        ymd(y.as_str(), m.as_str(), d.as_str())
    })
}

fn parse_date_prefix(value: &str) -> Option<NaiveDate> {
    let caps = ISO_DATE.captures(value)?;
    ymd(&caps[1], &caps[2], &caps[3])
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    (date.year() >= MIN_YEAR).then_some(date)
}

/// Publication date of `url`, or `None` on failure or after `limit`.
///
/// The lookup is abandoned when the limit passes.
pub async fn url_date<D: DateExtractor + ?Sized>(
    extractor: &D,
    url: &str,
    limit: Duration,
) -> Option<NaiveDate> {
    match tokio::time::timeout(limit, extractor.publication_date(url)).await {
        Ok(Ok(date)) => date,
        Ok(Err(e)) => {
            warn!(url, error = %e, "Date lookup failed");
            None
        }
        Err(_) => {
            debug!(url, limit_ms = limit.as_millis() as u64, "Date lookup timed out");
            None
        }
    }
}
