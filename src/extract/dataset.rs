use std::collections::HashSet;
use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use super::element_text;
use super::rules::{resolve_all, resolve_first, resolve_first_with, Probe};

/// A downloadable file linked from a detail page. `format` carries the
/// upper-cased extension (`CSV`, `JSON`, ...) or `UNKNOWN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub url: String,
    pub format: String,
}

/// Everything pulled from one dataset detail page. Fields are populated by
/// independent probes and any of them may stay empty; nothing ties `formats`
/// to `resources` beyond both being derived from the same anchors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub name: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub organization: String,
    pub tags: Vec<String>,
    pub formats: Vec<String>,
    pub resources: Vec<Resource>,
    pub created_at: String,
    pub updated_at: String,
    pub license: String,
    pub author: String,
}

// ── Field probe tables ──

pub const TITLE_PROBES: &[Probe] = &[
    Probe::text("h1"),
    Probe::text(".page-header h1"),
    Probe::text(".dataset-title"),
    Probe::text("title"),
    Probe::text(".dataset-header h1"),
    Probe::text(".content-header h1"),
];

pub const DESCRIPTION_PROBES: &[Probe] = &[
    Probe::text(".notes"),
    Probe::text(".description"),
    Probe::text(".dataset-description"),
    Probe::attr(r#"meta[name="description"]"#, "content"),
    Probe::text(".dataset-notes"),
    Probe::text(".content-description"),
];

pub const TAG_PROBES: &[Probe] = &[
    Probe::text(".tag"),
    Probe::text(".keyword"),
    Probe::text(".tag-list a"),
    Probe::text(".tags a"),
    Probe::text(".dataset-tags a"),
    Probe::text(".keyword-list a"),
];

pub const AUTHOR_PROBES: &[Probe] = &[
    Probe::text(".author"),
    Probe::text(".dataset-author"),
    Probe::text(".content-author"),
    Probe::attr(r#"meta[name="author"]"#, "content"),
];

pub const DATE_PROBES: &[Probe] = &[
    Probe::text_then_attr(".date", "datetime"),
    Probe::text_then_attr(".last-updated", "datetime"),
    Probe::text_then_attr(".modified", "datetime"),
    Probe::text_then_attr("time", "datetime"),
    Probe::text_then_attr(".dataset-date", "datetime"),
    Probe::text_then_attr(".content-date", "datetime"),
];

pub const LICENSE_PROBES: &[Probe] = &[
    Probe::text(".license"),
    Probe::text(".rights"),
    Probe::text(".terms"),
    Probe::text(".dataset-license"),
];

const RESOURCE_SELECTORS: &[&str] = &[
    r#"a[href*=".csv"]"#,
    r#"a[href*=".json"]"#,
    r#"a[href*=".xml"]"#,
    r#"a[href*=".xlsx"]"#,
    r#"a[href*=".pdf"]"#,
    ".resource-item a",
    r#"a[href*="download"]"#,
    r#"a[href*="api"]"#,
    ".resource a",
    ".download-link",
    ".file-link",
];

/// Extract a full record from one detail page. Selector misses never fail;
/// the affected field just stays empty.
pub fn extract_dataset(url: &str, html: &str, base: &Url, organization: &str) -> DatasetRecord {
    let doc = Html::parse_document(html);

    let resources = collect_resources(&doc, base);
    let formats: Vec<String> = resources
        .iter()
        .map(|r| r.format.to_lowercase())
        .unique()
        .collect();

    // The first date probe that hits fills exactly one of the two date
    // fields, keyed on "created" appearing in the selector or the value.
    let mut created_at = String::new();
    let mut updated_at = String::new();
    if let Some((selector, value)) = resolve_first_with(&doc, DATE_PROBES) {
        if selector.contains("created") || value.to_lowercase().contains("created") {
            created_at = value;
        } else {
            updated_at = value;
        }
    }

    DatasetRecord {
        name: slug_from_url(url),
        url: url.to_string(),
        title: resolve_first(&doc, TITLE_PROBES).unwrap_or_default(),
        description: resolve_first(&doc, DESCRIPTION_PROBES).unwrap_or_default(),
        organization: organization.to_string(),
        tags: resolve_all(&doc, TAG_PROBES),
        formats,
        resources,
        created_at,
        updated_at,
        license: resolve_first(&doc, LICENSE_PROBES).unwrap_or_default(),
        author: resolve_first(&doc, AUTHOR_PROBES).unwrap_or_default(),
    }
}

/// Union over all resource selectors, de-duplicated by resolved URL in
/// first-occurrence order.
fn collect_resources(doc: &Html, base: &Url) -> Vec<Resource> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for selector in RESOURCE_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for el in doc.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let Ok(full) = base.join(href) else {
                continue;
            };
            let full_url = full.to_string();
            if !seen.insert(full_url.clone()) {
                continue;
            }
            let text = element_text(&el);
            let name = if text.is_empty() {
                last_path_segment(&full)
            } else {
                text
            };
            out.push(Resource {
                name,
                url: full_url,
                format: derive_format(&full).to_uppercase(),
            });
        }
    }
    out
}

/// Trailing extension of the URL path, lower-cased; `unknown` without a dot.
pub fn derive_format(url: &Url) -> String {
    match url.path().rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "unknown".to_string(),
    }
}

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:en-)?dataset/([^/?#]+)").unwrap());

/// Path segment following the `dataset` / `en-dataset` segment, the portal's
/// stable identifier for a dataset.
pub fn slug_from_url(url: &str) -> String {
    SLUG_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn last_path_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or_default()
        .to_string()
}
