use std::time::Duration;

use itertools::Itertools;
use scraper::{Html, Selector};
use serde::Serialize;
use tokio::time::sleep;
use tracing::info;
use url::Url;

use crate::config::RunConfig;
use crate::extract::{document_text, element_text};
use crate::fetch::Fetcher;

/// Agency site sections checked for data-related content.
const SECTION_PATHS: &[&str] = &[
    "datasets",
    "data",
    "open-data",
    "api",
    "weather",
    "climate",
    "forecast",
    "observation",
    "marine",
    "aviation",
    "radiation",
    "air-quality",
    "uv-index",
    "tide",
    "typhoon",
    "warning",
    "radar",
    "satellite",
    "lightning",
    "rainfall",
];

/// Words whose presence flags a page as data-related.
const DATA_INDICATORS: &[&str] = &[
    "dataset",
    "data",
    "download",
    "api",
    "csv",
    "json",
    "xml",
    "weather data",
    "climate data",
    "meteorological data",
    "open data",
    "public data",
    "historical data",
];

/// Anchor patterns that tend to point at data on the landing page.
const LINK_SELECTORS: &[&str] = &[
    r#"a[href*="data"]"#,
    r#"a[href*="dataset"]"#,
    r#"a[href*="download"]"#,
    r#"a[href*="api"]"#,
    r#"a[href*="csv"]"#,
    r#"a[href*="json"]"#,
    r#"a[href*="xml"]"#,
    r#"a[href*="weather"]"#,
    r#"a[href*="climate"]"#,
];

#[derive(Debug, Clone, Serialize)]
pub struct FoundPage {
    pub url: String,
    pub title: String,
    pub content_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataLink {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SurveyFindings {
    pub pages: Vec<FoundPage>,
    pub links: Vec<DataLink>,
}

/// Walk the agency site's known sections and its landing page, recording
/// which sections talk about data and which landing-page links point at it.
pub async fn survey(fetcher: &Fetcher, cfg: &RunConfig) -> SurveyFindings {
    info!("Searching agency website for data-related content...");

    let mut findings = SurveyFindings::default();
    for section in SECTION_PATHS {
        let url = cfg.agency_section_url(section);
        info!("Checking: {}", url);
        if let Some(res) = fetcher.fetch_ok(&url).await {
            let doc = Html::parse_document(&res.raw_body);
            let text = document_text(&doc).to_lowercase();
            if DATA_INDICATORS.iter().any(|ind| text.contains(ind)) {
                info!("Found data-related content: {}", url);
                let title = doc
                    .select(&Selector::parse("title").unwrap())
                    .next()
                    .map(|el| element_text(&el))
                    .unwrap_or_else(|| "Unknown".to_string());
                findings.pages.push(FoundPage {
                    url,
                    title,
                    content_length: text.chars().count(),
                });
            }
        }
        sleep(Duration::from_millis(cfg.request_delay_ms)).await;
    }

    if let Some(res) = fetcher.fetch_ok(&cfg.agency_url).await {
        if let Ok(base) = Url::parse(&cfg.agency_url) {
            findings.links = data_links_in(&res.raw_body, &base);
        }
    }

    info!(
        "Found {} data-related pages and {} data links",
        findings.pages.len(),
        findings.links.len()
    );
    findings
}

/// Landing-page anchors matching any data pattern, de-duplicated by URL.
pub fn data_links_in(html: &str, base: &Url) -> Vec<DataLink> {
    let doc = Html::parse_document(html);
    let mut links = Vec::new();
    for selector in LINK_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for el in doc.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            if let Ok(full) = base.join(href) {
                links.push(DataLink {
                    url: full.to_string(),
                    text: element_text(&el),
                });
            }
        }
    }
    links.into_iter().unique_by(|l| l.url.clone()).collect()
}
