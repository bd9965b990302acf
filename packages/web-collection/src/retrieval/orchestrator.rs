//! Retrieval orchestration over the search proxy.
//!
//! A run expands the templates and splits the date range into chunks. Each
//! (query, chunk) unit is then paged through the proxy, query by query and
//! chunk by chunk, and a result is kept only if its link is new to the run.
//! Batch and streaming retrieval share the same validated plan and differ
//! only in how results are handed back.
//!
//! All input validation happens while planning, before the first remote call.
//! A failed page request aborts the run.

use async_stream::stream;
use futures::Stream;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dates::{date_chunks_for_retrieval, DateChunk};
use crate::error::{CollectionError, InputError, Result};
use crate::query::template::{expand_templates, normalize_variable_name};
use crate::retrieval::countries::CountryCatalog;
use crate::retrieval::request::{build_query, SearchPageRequest};
use crate::retrieval::seen::SeenRegistry;
use crate::traits::searcher::SearchProxy;
use crate::types::search::{
    RetrievalResults, RetrievedResult, SearchResult, VariableCombination, VariableSet,
};

/// Lazily produced retrieval results.
pub type RetrievalStream<'a> = Pin<Box<dyn Stream<Item = Result<RetrievedResult>> + Send + 'a>>;

/// Per-value country overrides for one template variable.
///
/// For every query, the value this variable took selects the outlet list
/// and/or geolocation used for that query's requests.
#[derive(Debug, Clone, Default)]
pub struct CountryAssignment {
    /// Variable whose values carry the assignment.
    pub variable: String,

    /// Variable value → Media Cloud country.
    pub media_cloud_countries: IndexMap<String, String>,

    /// Variable value → geolocation country.
    pub geolocation_countries: IndexMap<String, String>,
}

impl CountryAssignment {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            ..Default::default()
        }
    }

    pub fn with_media_cloud_country(
        mut self,
        value: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.media_cloud_countries.insert(value.into(), country.into());
        self
    }

    pub fn with_geolocation_country(
        mut self,
        value: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.geolocation_countries.insert(value.into(), country.into());
        self
    }
}

/// Parameters of one retrieval run.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub templates: Vec<String>,

    /// SERP pages requested per (query, chunk) unit.
    pub pages_per_query: usize,

    pub variables: Option<VariableSet>,

    /// Inclusive `YYYY-MM-DD` bounds.
    pub start_date: Option<String>,
    pub end_date: Option<String>,

    /// Split the date range into chunks of at most a year.
    pub time_chunking: bool,

    /// Restrict every query to this country's Media Cloud outlets.
    pub media_cloud_country: Option<String>,

    /// Geolocate every query to this country.
    pub geolocation_country: Option<String>,

    pub news_only: bool,

    /// Per-value overrides; exclusive with the two global countries.
    pub country_assignment: Option<CountryAssignment>,
}

impl RetrievalRequest {
    pub fn new<S: Into<String>>(templates: impl IntoIterator<Item = S>, pages_per_query: usize) -> Self {
        Self {
            templates: templates.into_iter().map(Into::into).collect(),
            pages_per_query,
            variables: None,
            start_date: None,
            end_date: None,
            time_chunking: false,
            media_cloud_country: None,
            geolocation_country: None,
            news_only: false,
            country_assignment: None,
        }
    }

    pub fn with_variables(mut self, variables: VariableSet) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_start_date(mut self, date: impl Into<String>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn with_end_date(mut self, date: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    pub fn with_time_chunking(mut self, enabled: bool) -> Self {
        self.time_chunking = enabled;
        self
    }

    pub fn with_media_cloud_country(mut self, country: impl Into<String>) -> Self {
        self.media_cloud_country = Some(country.into());
        self
    }

    pub fn with_geolocation_country(mut self, country: impl Into<String>) -> Self {
        self.geolocation_country = Some(country.into());
        self
    }

    pub fn with_news_only(mut self, news_only: bool) -> Self {
        self.news_only = news_only;
        self
    }

    pub fn with_country_assignment(mut self, assignment: CountryAssignment) -> Self {
        self.country_assignment = Some(assignment);
        self
    }
}

/// One expanded query with its resolved search restrictions.
#[derive(Debug, Clone)]
struct QueryUnit {
    query: String,
    combination: Option<VariableCombination>,
    sources: Option<Arc<[String]>>,
    country_code: Option<String>,
}

/// A validated retrieval run, ready to execute.
#[derive(Debug, Clone)]
struct SearchPlan {
    units: Vec<QueryUnit>,
    chunks: Vec<DateChunk>,
    pages_per_query: usize,
    news_only: bool,
}

impl SearchPlan {
    fn page_requests(&self, unit: &QueryUnit, chunk: &DateChunk) -> (String, Vec<SearchPageRequest>) {
        let query = build_query(&unit.query, chunk, unit.sources.as_deref());
        let requests = (0..self.pages_per_query)
            .map(|page| {
                SearchPageRequest::new(query.clone(), page)
                    .with_news_only(self.news_only)
                    .with_country_code(unit.country_code.clone())
            })
            .collect();
        (query, requests)
    }

    fn request_count(&self) -> usize {
        self.units.len() * self.chunks.len() * self.pages_per_query
    }
}

/// Runs retrieval against a search proxy.
pub struct Retriever<P: SearchProxy> {
    proxy: P,
    catalog: Arc<CountryCatalog>,
}

impl<P: SearchProxy> Retriever<P> {
    pub fn new(proxy: P, catalog: Arc<CountryCatalog>) -> Self {
        Self { proxy, catalog }
    }

    /// Retriever using the bundled country data.
    pub fn with_bundled_countries(proxy: P) -> Result<Self> {
        Ok(Self::new(proxy, Arc::new(CountryCatalog::bundled()?)))
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }

    pub fn catalog(&self) -> &CountryCatalog {
        &self.catalog
    }

    /// Validate the request and resolve every query's restrictions.
    fn plan(&self, request: &RetrievalRequest) -> std::result::Result<SearchPlan, InputError> {
        if let Some(assignment) = &request.country_assignment {
            if request.media_cloud_country.is_some() || request.geolocation_country.is_some() {
                return Err(InputError::ConflictingCountryAssignment {
                    variable: assignment.variable.clone(),
                });
            }
        }

        let chunks = date_chunks_for_retrieval(
            request.start_date.as_deref(),
            request.end_date.as_deref(),
            request.time_chunking,
        )?;

        let global_sources: Option<Arc<[String]>> = request
            .media_cloud_country
            .as_deref()
            .map(|country| self.catalog.media_cloud_sources(country).map(Arc::from))
            .transpose()?;
        let global_code = request
            .geolocation_country
            .as_deref()
            .map(|country| self.catalog.geolocation_code(country).map(str::to_string))
            .transpose()?;

        let overrides = request
            .country_assignment
            .as_ref()
            .map(|assignment| self.resolve_assignment(assignment, request.variables.as_ref()))
            .transpose()?;

        let units = expand_templates(&request.templates, request.variables.as_ref())
            .into_iter()
            .map(|item| {
                let mut sources = global_sources.clone();
                let mut country_code = global_code.clone();
                let assigned = overrides
                    .as_ref()
                    .and_then(|o| item.value_of(&o.variable).map(|value| (o, value)));
                if let Some((overrides, value)) = assigned {
                    if let Some(assigned_sources) = overrides.sources.get(value) {
                        debug!(value, count = assigned_sources.len(), "Using assigned Media Cloud sources");
                        sources = Some(assigned_sources.clone());
                    }
                    if let Some(code) = overrides.codes.get(value) {
                        debug!(value, code = %code, "Using assigned geolocation");
                        country_code = Some(code.clone());
                    }
                }
                QueryUnit {
                    query: item.query,
                    combination: item.combination,
                    sources,
                    country_code,
                }
            })
            .collect();

        Ok(SearchPlan {
            units,
            chunks,
            pages_per_query: request.pages_per_query,
            news_only: request.news_only,
        })
    }

    fn resolve_assignment(
        &self,
        assignment: &CountryAssignment,
        variables: Option<&VariableSet>,
    ) -> std::result::Result<ResolvedAssignment, InputError> {
        let variable = normalize_variable_name(&assignment.variable);
        let known: HashSet<String> = variables
            .map(|vars| vars.keys().map(|k| normalize_variable_name(k)).collect())
            .unwrap_or_default();
        if !known.contains(&variable) {
            warn!(
                variable = %assignment.variable,
                "Country assignment variable not found in query variables"
            );
        }

        let sources: IndexMap<String, Arc<[String]>> = assignment
            .media_cloud_countries
            .iter()
            .map(|(value, country)| {
                let sources = self.catalog.media_cloud_sources(country)?;
                Ok((value.clone(), Arc::from(sources)))
            })
            .collect::<std::result::Result<_, InputError>>()?;
        let codes: IndexMap<String, String> = assignment
            .geolocation_countries
            .iter()
            .map(|(value, country)| {
                let code = self.catalog.geolocation_code(country)?;
                Ok((value.clone(), code.to_string()))
            })
            .collect::<std::result::Result<_, InputError>>()?;

        Ok(ResolvedAssignment {
            variable,
            sources,
            codes,
        })
    }

    /// Run the whole retrieval and return results grouped by combination and
    /// query.
    ///
    /// Every query appears under its combination, with an empty list if all of
    /// its results were duplicates. The first failed page request aborts the
    /// run and nothing is returned.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResults> {
        let plan = self.plan(request)?;
        info!(
            queries = plan.units.len(),
            chunks = plan.chunks.len(),
            requests = plan.request_count(),
            "Starting webpage retrieval"
        );

        let mut seen = SeenRegistry::new();
        let mut results = RetrievalResults::new();

        for unit in &plan.units {
            debug!(query = %unit.query, combination = ?unit.combination, "Processing query");
            let bucket = results
                .entry(unit.combination.clone())
                .or_default()
                .entry(unit.query.clone())
                .or_default();

            for chunk in &plan.chunks {
                let (_, page_requests) = plan.page_requests(unit, chunk);
                for page_request in &page_requests {
                    let page = self.fetch_page(page_request).await?;
                    bucket.extend(page.into_iter().filter(|r| seen.insert_if_new(&r.link)));
                }
            }
        }

        info!(unique_links = seen.len(), "Webpage retrieval complete");
        Ok(results)
    }

    /// Retrieve lazily, yielding each new result as soon as its page returns.
    ///
    /// Input is validated before the stream is returned. Items carry the
    /// query as sent, including date and site filters. At most one page
    /// request is in flight, and nothing is fetched until the caller polls.
    /// After an error the stream ends.
    pub fn retrieve_stream(&self, request: &RetrievalRequest) -> Result<RetrievalStream<'_>> {
        let plan = self.plan(request)?;
        info!(
            queries = plan.units.len(),
            chunks = plan.chunks.len(),
            "Starting streaming webpage retrieval"
        );

        Ok(Box::pin(stream! {
            let mut seen = SeenRegistry::new();

            for unit in &plan.units {
                for chunk in &plan.chunks {
                    let (query, page_requests) = plan.page_requests(unit, chunk);
                    for page_request in &page_requests {
                        let page = match self.fetch_page(page_request).await {
                            Ok(page) => page,
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        };
                        for result in page {
                            if seen.insert_if_new(&result.link) {
                                yield Ok(RetrievedResult {
                                    combination: unit.combination.clone(),
                                    query: query.clone(),
                                    result,
                                });
                            }
                        }
                    }
                }
            }

            info!(unique_links = seen.len(), "Streaming webpage retrieval complete");
        }))
    }

    async fn fetch_page(&self, request: &SearchPageRequest) -> Result<Vec<SearchResult>> {
        self.proxy.search_page(request).await.map_err(|e| {
            warn!(query = %request.query, page = request.page, error = %e, "Search request failed");
            CollectionError::retrieval(e)
        })
    }
}

/// Country assignment with every country resolved to sources or a code.
#[derive(Debug)]
struct ResolvedAssignment {
    variable: String,
    sources: IndexMap<String, Arc<[String]>>,
    codes: IndexMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSearchProxy;
    use futures::StreamExt;

    fn catalog() -> Arc<CountryCatalog> {
        Arc::new(
            CountryCatalog::from_json(
                r#"{"Kenya": "ke", "Ghana": "gh"}"#,
                r#"{"Kenya": ["nation.africa", "standardmedia.co.ke"], "Ghana": ["myjoyonline.com"]}"#,
            )
            .unwrap(),
        )
    }

    fn vars(entries: &[(&str, &[&str])]) -> VariableSet {
        entries
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_conflicting_assignment_rejected() {
        let retriever = Retriever::new(MockSearchProxy::new(), catalog());
        let request = RetrievalRequest::new(["q"], 1)
            .with_geolocation_country("Kenya")
            .with_country_assignment(CountryAssignment::new("country"));

        assert!(matches!(
            retriever.plan(&request),
            Err(InputError::ConflictingCountryAssignment { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_country_fails_before_any_request() {
        let proxy = MockSearchProxy::new();
        let retriever = Retriever::new(proxy, catalog());
        let request = RetrievalRequest::new(["q"], 3).with_geolocation_country("Atlantis");

        let err = retriever.retrieve(&request).await.unwrap_err();
        assert!(matches!(
            err,
            CollectionError::Input(InputError::UnknownGeolocationCountry(_))
        ));
        assert!(retriever.proxy().requests().is_empty());

        let request = RetrievalRequest::new(["q"], 3).with_country_assignment(
            CountryAssignment::new("country").with_media_cloud_country("X", "Atlantis"),
        );
        assert!(matches!(
            retriever.retrieve_stream(&request).err(),
            Some(CollectionError::Input(InputError::UnknownMediaCloudCountry(_)))
        ));
    }

    #[test]
    fn test_global_restrictions_apply_to_every_query() {
        let retriever = Retriever::new(MockSearchProxy::new(), catalog());
        let request = RetrievalRequest::new(["a", "b"], 1)
            .with_media_cloud_country("Ghana")
            .with_geolocation_country("Kenya");
        let plan = retriever.plan(&request).unwrap();

        assert_eq!(plan.units.len(), 2);
        for unit in &plan.units {
            assert_eq!(unit.sources.as_deref(), Some(&["myjoyonline.com".to_string()][..]));
            assert_eq!(unit.country_code.as_deref(), Some("ke"));
        }
    }

    #[test]
    fn test_assignment_uses_template_variable_position() {
        let retriever = Retriever::new(MockSearchProxy::new(), catalog());
        let variables = vars(&[("year", &["2020"]), ("Country Name", &["KE", "GH"])]);
        let assignment = CountryAssignment::new("country name")
            .with_media_cloud_country("KE", "Kenya")
            .with_geolocation_country("GH", "Ghana");
        let request = RetrievalRequest::new(["floods {country_name}", "drought {year}"], 1)
            .with_variables(variables)
            .with_country_assignment(assignment);
        let plan = retriever.plan(&request).unwrap();

        let units: Vec<_> = plan.units.iter().map(|u| u.query.as_str()).collect();
        assert_eq!(units, vec!["floods KE", "floods GH", "drought 2020"]);

        assert_eq!(plan.units[0].sources.as_ref().map(|s| s.len()), Some(2));
        assert_eq!(plan.units[0].country_code, None);
        assert!(plan.units[1].sources.is_none());
        assert_eq!(plan.units[1].country_code.as_deref(), Some("gh"));
        assert!(plan.units[2].sources.is_none());
        assert_eq!(plan.units[2].country_code, None);
    }

    #[tokio::test]
    async fn test_pages_requested_at_offsets() {
        let proxy = MockSearchProxy::new()
            .with_results("q", 0, vec![SearchResult::new("https://a.com")])
            .with_results("q", 20, vec![SearchResult::new("https://b.com")]);
        let retriever = Retriever::new(proxy, catalog());
        let request = RetrievalRequest::new(["q"], 3).with_geolocation_country("Ghana");

        let results = retriever.retrieve(&request).await.unwrap();
        let links: Vec<_> = results[&None]["q"].iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["https://a.com", "https://b.com"]);

        let requests = retriever.proxy().requests();
        let starts: Vec<_> = requests.iter().map(|r| r.start()).collect();
        assert_eq!(starts, vec![0, 20, 40]);
        assert!(requests.iter().all(|r| r.country_code.as_deref() == Some("gh")));
    }

    #[tokio::test]
    async fn test_batch_keeps_queries_with_only_duplicates() {
        let proxy = MockSearchProxy::new()
            .with_results("first", 0, vec![SearchResult::new("https://same.com")])
            .with_results("second", 0, vec![SearchResult::new("https://same.com")]);
        let retriever = Retriever::new(proxy, catalog());

        let results = retriever
            .retrieve(&RetrievalRequest::new(["first", "second"], 1))
            .await
            .unwrap();

        assert_eq!(results[&None]["first"].len(), 1);
        assert!(results[&None]["second"].is_empty());
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_stops_after_error() {
        let proxy = MockSearchProxy::new()
            .with_results("q", 0, vec![SearchResult::new("https://a.com")])
            .fail_on("q", 20);
        let retriever = Retriever::new(proxy, catalog());
        let request = RetrievalRequest::new(["q"], 3);

        let mut stream = retriever.retrieve_stream(&request).unwrap();
        assert!(retriever.proxy().requests().is_empty());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.result.link, "https://a.com");
        assert_eq!(retriever.proxy().requests().len(), 1);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, CollectionError::Retrieval { .. }));
        assert!(stream.next().await.is_none());
        assert_eq!(retriever.proxy().requests().len(), 2);
    }
}
