//! Grounding verification for extracted datapoints.
//!
//! A datapoint is grounded when its `grounding_quote` occurs in the page it
//! came from. Both sides are compared after markdown links and images are
//! stripped from the page and everything but letters and digits is dropped,
//! so reflowed whitespace, punctuation and escaping don't break a match.
//! Comparison ignores case.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::types::datapoint::Datapoint;

static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());

static EMPTY_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\]\([^)]*\)").unwrap());

static INLINE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());

static REFERENCE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\[[^\]]*\]").unwrap());

static REFERENCE_DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\[[^\]]+\]:[^\n]*$").unwrap());

/// Remove markdown link and image syntax.
///
/// Images and empty links are deleted, inline and reference links keep their
/// text, and reference definition lines are blanked. Passes repeat until the
/// text stops changing, so stripping is idempotent.
pub fn strip_markdown_links(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let text = IMAGE.replace_all(text, "");
    let text = EMPTY_LINK.replace_all(&text, "");
    let text = INLINE_LINK.replace_all(&text, "${1}");
    let text = REFERENCE_LINK.replace_all(&text, "${1}");
    REFERENCE_DEFINITION.replace_all(&text, "").into_owned()
}

/// Lowercased letters and digits of `text`, everything else dropped.
pub fn alphanumeric_only(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Page text reduced for quote matching; build once per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage(String);

impl NormalizedPage {
    pub fn new(page_text: &str) -> Self {
        Self(alphanumeric_only(&strip_markdown_links(page_text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reduced `quote` occurs contiguously in the page.
    ///
    /// A quote with no letters or digits never matches.
    pub fn contains_quote(&self, quote: &str) -> bool {
        let reduced = alphanumeric_only(quote);
        !reduced.is_empty() && self.0.contains(&reduced)
    }
}

/// Outcome of one grounding check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingCheck {
    pub is_grounded: bool,

    /// Reduced page text; `None` when there was no quote to check.
    pub normalized_page: Option<NormalizedPage>,
}

/// Check a quote against page text.
pub fn check_grounding(quote: Option<&str>, page_text: &str) -> GroundingCheck {
    let Some(quote) = quote.filter(|q| !q.is_empty()) else {
        return GroundingCheck {
            is_grounded: false,
            normalized_page: None,
        };
    };
    let page = NormalizedPage::new(page_text);
    GroundingCheck {
        is_grounded: page.contains_quote(quote),
        normalized_page: Some(page),
    }
}

/// `url` with a text-fragment locator pointing at `quote`.
pub fn text_fragment_source(url: &str, quote: &str) -> String {
    format!("{}#:~:text={}", url, urlencoding::encode(quote))
}

/// Set `is_grounded` and `source` on a datapoint extracted from `url`.
pub fn ground_datapoint(datapoint: &mut Datapoint, url: &str, page: &NormalizedPage) {
    let quote = datapoint.grounding_quote.as_deref().filter(|q| !q.is_empty());
    datapoint.is_grounded = quote.is_some_and(|q| page.contains_quote(q));
    datapoint.source = match quote {
        Some(q) if datapoint.is_grounded => text_fragment_source(url, q),
        _ => url.to_string(),
    };
    debug!(url, is_grounded = datapoint.is_grounded, "Grounded datapoint");
}
