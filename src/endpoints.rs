use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::fetch::{FetchError, Fetcher};

/// Portal endpoints worth probing, discovered from the portal's own markup.
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("datasets_api", "/api/v1/datasets"),
    ("providers_json", "/filestore/json/providers_en.json"),
    ("categories_json", "/filestore/json/categories_en.json"),
    ("formats_json", "/filestore/json/formats.json"),
    ("rss_feed", "/filestore/feeds/data_rss_en.xml"),
    ("climate_weather_category", "/en-datasets/category/climate-and-weather"),
    ("hko_provider", "/en-datasets/provider/hk-hko"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Error,
}

/// Outcome of probing one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointCheck {
    pub name: &'static str,
    pub url: String,
    pub status: CheckStatus,
    pub status_code: Option<u16>,
    pub content_type: String,
    pub size: usize,
    /// Top-level object keys when the endpoint returned a JSON object.
    pub json_keys: Vec<String>,
    /// Item titles when the endpoint returned an RSS feed.
    pub rss_titles: Vec<String>,
    pub error: Option<String>,
}

/// Probe every known endpoint in order, one paced request each.
pub async fn check_all(fetcher: &Fetcher, cfg: &RunConfig) -> Vec<EndpointCheck> {
    info!("Checking all API endpoints...");
    let mut checks = Vec::with_capacity(ENDPOINTS.len());
    for (name, path) in ENDPOINTS {
        checks.push(check_endpoint(fetcher, cfg, name, path).await);
        sleep(Duration::from_millis(cfg.request_delay_ms)).await;
    }
    checks
}

async fn check_endpoint(
    fetcher: &Fetcher,
    cfg: &RunConfig,
    name: &'static str,
    path: &str,
) -> EndpointCheck {
    let url = cfg.endpoint_url(path);
    info!("Checking {}: {}", name, url);

    match fetcher.fetch(&url).await {
        Ok(res) => {
            let json_keys = if res.content_type.contains("application/json") {
                top_level_keys(&res.raw_body)
            } else {
                Vec::new()
            };
            let rss_titles = if res.content_type.contains("xml") || path.ends_with(".xml") {
                match parse_rss_titles(&res.raw_body) {
                    Ok(titles) => titles,
                    Err(e) => {
                        warn!("Failed to parse feed from {}: {}", url, e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };
            EndpointCheck {
                name,
                url,
                status: CheckStatus::Success,
                status_code: Some(res.status_code),
                content_type: res.content_type,
                size: res.raw_body.len(),
                json_keys,
                rss_titles,
                error: None,
            }
        }
        Err(e) => EndpointCheck {
            name,
            url,
            status: CheckStatus::Error,
            status_code: match &e {
                FetchError::Status { status, .. } => Some(*status),
                _ => None,
            },
            content_type: String::new(),
            size: 0,
            json_keys: Vec::new(),
            rss_titles: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

fn top_level_keys(body: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Parse an RSS document and return all <item> titles.
pub fn parse_rss_titles(xml: &str) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut titles = Vec::new();
    let mut in_item = false;
    let mut in_title = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.name().as_ref() {
                b"item" => in_item = true,
                b"title" if in_item => in_title = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(e)) if in_title => {
                titles.push(e.unescape()?.to_string());
            }
            Ok(quick_xml::events::Event::CData(e)) if in_title => {
                titles.push(String::from_utf8_lossy(&e.into_inner()).to_string());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.name().as_ref() {
                b"title" => in_title = false,
                b"item" => in_item = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>data.gov.hk datasets</title>
    <item><title>Daily Weather Summary</title><link>https://data.gov.hk/en-dataset/daily-weather-summary</link></item>
    <item><title><![CDATA[Tide Data]]></title></item>
  </channel>
</rss>"#;

    #[test]
    fn rss_titles_skip_channel_title() {
        let titles = parse_rss_titles(FEED).unwrap();
        assert_eq!(titles, ["Daily Weather Summary", "Tide Data"]);
    }

    #[test]
    fn json_keys_of_non_object_are_empty() {
        assert!(top_level_keys("[1, 2, 3]").is_empty());
        assert!(top_level_keys("not json").is_empty());
        assert_eq!(top_level_keys(r#"{"providers": []}"#), ["providers"]);
    }

    #[tokio::test]
    async fn check_all_covers_every_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/filestore/json/providers_en.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"providers": [], "total": 0}"#, "application/json"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/filestore/feeds/data_rss_en.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FEED, "application/xml"))
            .mount(&server)
            .await;

        let cfg = RunConfig {
            base_url: server.uri(),
            base_backoff_ms: 1,
            request_delay_ms: 1,
            ..RunConfig::default()
        };
        let fetcher = Fetcher::new(&cfg).unwrap();

        let checks = check_all(&fetcher, &cfg).await;
        assert_eq!(checks.len(), ENDPOINTS.len());

        let providers = checks.iter().find(|c| c.name == "providers_json").unwrap();
        assert_eq!(providers.status, CheckStatus::Success);
        assert_eq!(providers.json_keys, ["providers", "total"]);

        let rss = checks.iter().find(|c| c.name == "rss_feed").unwrap();
        assert_eq!(rss.rss_titles.len(), 2);

        // Everything unmocked 404s and must surface as an error check.
        let api = checks.iter().find(|c| c.name == "datasets_api").unwrap();
        assert_eq!(api.status, CheckStatus::Error);
        assert_eq!(api.status_code, Some(404));
    }
}
