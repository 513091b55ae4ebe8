use std::collections::HashSet;
use std::time::Duration;

use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::config::RunConfig;
use crate::extract::document_text;
use crate::fetch::Fetcher;

/// Anchor shapes a provider listing page may use for dataset links. A
/// provider-specific pattern is appended at runtime.
const LISTING_LINK_PATTERNS: &[&str] = &[
    r#"a[href*="/dataset/"]"#,
    r#"a[href*="/en-dataset/"]"#,
    ".dataset-item a",
    ".result-item a",
    ".search-result a",
];

const SEARCH_TERMS: &[&str] = &[
    "weather",
    "climate",
    "meteorological",
    "temperature",
    "rainfall",
    "wind",
    "humidity",
    "pressure",
    "forecast",
    "observation",
];

/// Both href shapes the portal uses for detail-page links.
const DATASET_ANCHOR_PATTERNS: &[&str] =
    &[r#"a[href*="/dataset/"]"#, r#"a[href*="/en-dataset/"]"#];

/// Listing pages that say this in their visible text have run out of results.
const STOP_MARKERS: &[&str] = &["no results found", "total 0 results"];

/// Selectors whose presence marks a guessed URL as a real detail page.
const EXISTENCE_SELECTORS: &[&str] = &[
    ".dataset-title",
    ".dataset-description",
    ".dataset-notes",
    ".notes",
    ".description",
    "h1",
    ".page-title",
];

const CONTENT_MARKERS: &[&str] = &["dataset", "data", "download", "resource"];

/// Slugs the provider plausibly publishes under, for the last-resort guess.
const DATASET_SLUGS: &[&str] = &[
    // observations
    "weather-observations-hong-kong",
    "daily-weather-summary",
    "hourly-weather-data",
    "weather-station-data",
    "automatic-weather-station",
    "weather-observations",
    "weather-data",
    // climate
    "climate-data-hong-kong",
    "monthly-climate-summary",
    "annual-climate-report",
    "temperature-data",
    "rainfall-data",
    "humidity-data",
    "wind-data",
    "pressure-data",
    // forecasts
    "weather-forecast",
    "7-day-weather-forecast",
    "extended-weather-forecast",
    "tropical-cyclone-forecast",
    "typhoon-forecast",
    "storm-warning",
    // specialized
    "air-quality-data",
    "uv-index-data",
    "tide-data",
    "sea-surface-temperature",
    "marine-weather",
    "aviation-weather",
    // historical
    "historical-weather-data",
    "weather-archive",
    "climate-records",
    "extreme-weather-events",
    // real-time
    "real-time-weather",
    "current-weather-conditions",
    "live-weather-data",
    "weather-alerts",
    // stations and imagery
    "weather-station-locations",
    "meteorological-stations",
    "weather-radar-data",
    "satellite-imagery",
    // seasonal
    "seasonal-weather-patterns",
    "monsoon-data",
    "seasonal-forecast",
    "climate-change-data",
    // phenomena
    "thunderstorm-data",
    "fog-data",
    "heat-wave-data",
    "cold-wave-data",
    "drought-data",
    // research
    "meteorological-research",
    "climate-research-data",
    "weather-pattern-analysis",
    "climate-trends",
    // public information
    "weather-warnings",
    "public-weather-service",
    "weather-education-data",
    "meteorological-glossary",
];

/// URLs seen so far in this run; candidates keep first-seen order.
#[derive(Debug, Default)]
pub struct DiscoveryState {
    seen: HashSet<String>,
    candidates: Vec<String>,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, url: String) {
        if self.seen.insert(url.clone()) {
            self.candidates.push(url);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn into_candidates(self) -> Vec<String> {
        self.candidates
    }
}

/// Find candidate detail-page URLs. Strategies are strictly ordered; a later
/// one runs only when everything before it came up empty. Fetch failures are
/// logged and treated as "no data", never as run failures.
pub async fn discover(fetcher: &Fetcher, cfg: &RunConfig, base: &Url) -> Vec<String> {
    let mut state = DiscoveryState::new();

    scrape_listing(fetcher, cfg, base, &mut state).await;

    if state.is_empty() {
        warn!("No dataset URLs found. Trying alternative approach...");
        probe_search_terms(fetcher, cfg, base, &mut state).await;
    }

    if state.is_empty() {
        warn!("Search probing found nothing, testing known dataset names...");
        probe_known_slugs(fetcher, cfg, &mut state).await;
    }

    info!("Found {} potential dataset links", state.len());
    state.into_candidates()
}

/// Strategy 1: the provider listing page, then a few canned searches, then
/// the paginated listing. Aborts entirely when the listing page is down.
async fn scrape_listing(fetcher: &Fetcher, cfg: &RunConfig, base: &Url, state: &mut DiscoveryState) {
    info!("Finding all provider datasets...");

    let Some(res) = fetcher.fetch_ok(&cfg.provider_listing_url()).await else {
        warn!("Failed to fetch main provider page");
        return;
    };

    let doc = Html::parse_document(&res.raw_body);
    let mut patterns: Vec<String> = LISTING_LINK_PATTERNS.iter().map(|p| p.to_string()).collect();
    patterns.push(format!(r#"a[href*="{}"]"#, cfg.provider));

    for pattern in &patterns {
        let Ok(sel) = Selector::parse(pattern) else {
            continue;
        };
        for el in doc.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            if !href.contains("dataset") && !href.contains(cfg.provider.as_str()) {
                continue;
            }
            if let Ok(full) = base.join(href) {
                state.push(full.to_string());
            }
        }
    }

    let search_urls = [
        cfg.search_url("weather"),
        cfg.search_url("climate"),
        cfg.search_url("meteorological"),
        cfg.provider_filter_url(),
    ];
    for url in &search_urls {
        if let Some(res) = fetcher.fetch_ok(url).await {
            let doc = Html::parse_document(&res.raw_body);
            collect_dataset_anchors(&doc, base, state);
        }
    }

    for page in 1..=cfg.max_pages {
        let Some(res) = fetcher.fetch_ok(&cfg.listing_page_url(page)).await else {
            break;
        };
        let doc = Html::parse_document(&res.raw_body);
        let text = document_text(&doc).to_lowercase();
        if STOP_MARKERS.iter().any(|m| text.contains(m)) {
            info!("Page {} shows no results, stopping pagination", page);
            break;
        }
        if collect_dataset_anchors(&doc, base, state) == 0 {
            break;
        }
        sleep(Duration::from_millis(cfg.page_delay_ms)).await;
    }
}

/// Strategy 2: one search query per canned term.
async fn probe_search_terms(
    fetcher: &Fetcher,
    cfg: &RunConfig,
    base: &Url,
    state: &mut DiscoveryState,
) {
    for term in SEARCH_TERMS {
        if let Some(res) = fetcher.fetch_ok(&cfg.search_url(term)).await {
            let doc = Html::parse_document(&res.raw_body);
            collect_dataset_anchors(&doc, base, state);
        }
        sleep(Duration::from_millis(cfg.request_delay_ms)).await;
    }
}

/// Strategy 3: guess detail URLs from the slug list, keeping the ones that
/// pass the existence check.
async fn probe_known_slugs(fetcher: &Fetcher, cfg: &RunConfig, state: &mut DiscoveryState) {
    for (i, slug) in DATASET_SLUGS.iter().enumerate() {
        info!("Testing dataset {}/{}: {}", i + 1, DATASET_SLUGS.len(), slug);
        let url = cfg.dataset_url(slug);
        if let Some(res) = fetcher.probe(&url).await {
            if looks_like_dataset_page(&res.raw_body) {
                state.push(url);
            }
        }
        sleep(Duration::from_millis(cfg.request_delay_ms)).await;
    }
}

/// Number of dataset-link anchors on the page; every resolvable one is
/// offered to the state.
fn collect_dataset_anchors(doc: &Html, base: &Url, state: &mut DiscoveryState) -> usize {
    let mut matched = 0;
    for pattern in DATASET_ANCHOR_PATTERNS {
        let sel = Selector::parse(pattern).unwrap();
        for el in doc.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            matched += 1;
            if let Ok(full) = base.join(href) {
                state.push(full.to_string());
            }
        }
    }
    matched
}

/// A guessed URL counts as real when the page carries one of the detail-page
/// selectors, or failing that, a dataset-ish word in its visible text.
pub fn looks_like_dataset_page(html: &str) -> bool {
    let doc = Html::parse_document(html);
    for selector in EXISTENCE_SELECTORS {
        if let Ok(sel) = Selector::parse(selector) {
            if doc.select(&sel).next().is_some() {
                return true;
            }
        }
    }
    let text = document_text(&doc).to_lowercase();
    CONTENT_MARKERS.iter().any(|m| text.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_cfg(server: &MockServer) -> RunConfig {
        RunConfig {
            base_url: server.uri(),
            base_backoff_ms: 1,
            request_delay_ms: 1,
            page_delay_ms: 1,
            ..RunConfig::default()
        }
    }

    fn page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn existence_check_accepts_indicator() {
        assert!(looks_like_dataset_page(
            "<html><body><h1>Tide Data</h1></body></html>"
        ));
    }

    #[test]
    fn existence_check_accepts_content_marker() {
        assert!(looks_like_dataset_page(
            "<html><body><p>Download the monthly archive here.</p></body></html>"
        ));
    }

    #[test]
    fn existence_check_rejects_unrelated_page() {
        assert!(!looks_like_dataset_page(
            "<html><body><p>Nothing to see.</p></body></html>"
        ));
    }

    #[tokio::test]
    async fn listing_hit_skips_fallback_strategies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en-datasets/provider/hk-hko"))
            .respond_with(page(
                r#"<a href="/en-dataset/rainfall-data">Rainfall</a>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .respond_with(page("<p>No results found</p>"))
            .mount(&server)
            .await;
        // Brute-force guessing must never fire once the listing hit.
        Mock::given(method("GET"))
            .and(path_regex("^/en-dataset/.+"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cfg = test_cfg(&server);
        let fetcher = Fetcher::new(&cfg).unwrap();
        let base = Url::parse(&cfg.base_url).unwrap();

        let candidates = discover(&fetcher, &cfg, &base).await;
        assert_eq!(
            candidates,
            [format!("{}/en-dataset/rainfall-data", server.uri())]
        );
    }

    #[tokio::test]
    async fn falls_back_to_search_probing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en-datasets/provider/hk-hko"))
            .respond_with(page("<p>empty</p>"))
            .mount(&server)
            .await;
        // "temperature" is not one of the canned strategy-1 searches, so a
        // hit here proves strategy 2 ran.
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .and(query_param("q", "temperature"))
            .respond_with(page(r#"<a href="/en-dataset/temperature-data">T</a>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .respond_with(page("<p>Total 0 results</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/en-dataset/.+"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let cfg = test_cfg(&server);
        let fetcher = Fetcher::new(&cfg).unwrap();
        let base = Url::parse(&cfg.base_url).unwrap();

        let candidates = discover(&fetcher, &cfg, &base).await;
        assert_eq!(
            candidates,
            [format!("{}/en-dataset/temperature-data", server.uri())]
        );
    }

    #[tokio::test]
    async fn brute_force_runs_last_and_checks_existence() {
        let server = MockServer::start().await;
        // Nothing mocked for listings or searches: those all 404, so the
        // first two strategies come up empty.
        Mock::given(method("GET"))
            .and(path("/en-dataset/tide-data"))
            .respond_with(page("<h1>Tide Data</h1>"))
            .mount(&server)
            .await;

        let cfg = test_cfg(&server);
        let fetcher = Fetcher::new(&cfg).unwrap();
        let base = Url::parse(&cfg.base_url).unwrap();

        let candidates = discover(&fetcher, &cfg, &base).await;
        assert_eq!(candidates, [format!("{}/en-dataset/tide-data", server.uri())]);
    }

    #[tokio::test]
    async fn pagination_stops_on_empty_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en-datasets/provider/hk-hko"))
            .respond_with(page(r#"<a href="/en-dataset/first">First</a>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .and(query_param("page", "1"))
            .respond_with(page(r#"<a href="/en-dataset/second">Second</a>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .and(query_param("page", "2"))
            .respond_with(page("<p>Total 0 results</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/en-datasets"))
            .respond_with(page("<p>No results found</p>"))
            .mount(&server)
            .await;

        let cfg = test_cfg(&server);
        let fetcher = Fetcher::new(&cfg).unwrap();
        let base = Url::parse(&cfg.base_url).unwrap();

        let candidates = discover(&fetcher, &cfg, &base).await;
        assert_eq!(
            candidates,
            [
                format!("{}/en-dataset/first", server.uri()),
                format!("{}/en-dataset/second", server.uri()),
            ]
        );
    }
}
