use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::fetch::Fetcher;

/// One dataset as described by the CKAN Action API, including the maintainer
/// contact and per-resource size/mimetype the HTML detail pages never render.
/// Missing or null API fields come through as empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDataset {
    pub name: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub organization: String,
    pub tags: Vec<String>,
    pub license: String,
    pub created: String,
    pub last_updated: String,
    pub author: String,
    pub maintainer: String,
    pub maintainer_email: String,
    pub resources: Vec<ApiResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResource {
    pub name: String,
    pub description: String,
    pub url: String,
    /// Upper-cased format label as published by the API.
    pub format: String,
    /// Published as a byte count for most resources, occasionally free text.
    pub size: String,
    pub mimetype: String,
    pub created: String,
    pub last_modified: String,
}

/// Standard CKAN response wrapper; `result` is only meaningful when `success`
/// is true.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    result: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrgInfo {
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Package {
    name: String,
    title: String,
    notes: Option<String>,
    organization: Option<OrgInfo>,
    tags: Vec<TagRef>,
    license_title: Option<String>,
    metadata_created: Option<String>,
    metadata_modified: Option<String>,
    author: Option<String>,
    maintainer: Option<String>,
    maintainer_email: Option<String>,
    resources: Vec<ResourceRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagRef {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceRef {
    name: Option<String>,
    description: Option<String>,
    url: Option<String>,
    format: Option<String>,
    size: Option<Value>,
    mimetype: Option<String>,
    created: Option<String>,
    last_modified: Option<String>,
}

/// Full inventory scrape through the portal's CKAN Action API:
/// `organization_show` to confirm the provider, `package_list` for the
/// dataset names, then one `package_show` per name. A failing detail call
/// skips that dataset; a failing organization or list call aborts the run.
pub async fn scrape(
    fetcher: &Fetcher,
    cfg: &RunConfig,
    limit: Option<usize>,
) -> Result<Vec<ApiDataset>> {
    info!("Fetching {} datasets using CKAN API...", cfg.provider);
    let org: OrgInfo = call_action(fetcher, &cfg.organization_show_url())
        .await
        .context("organization lookup failed")?;
    info!("Organization: {}", org.title);

    let mut names: Vec<String> = call_action(fetcher, &cfg.package_list_url())
        .await
        .context("package list failed")?;
    info!("Found {} datasets in organization", names.len());
    if let Some(limit) = limit {
        names.truncate(limit);
    }

    let total = names.len();
    let mut datasets = Vec::with_capacity(total);
    for (i, name) in names.iter().enumerate() {
        info!("Processing dataset {}/{}: {}", i + 1, total, name);
        match call_action::<Package>(fetcher, &cfg.package_show_url(name)).await {
            Ok(pkg) => {
                let dataset = dataset_from_package(pkg, cfg);
                info!("Successfully scraped: {}", dataset.title);
                datasets.push(dataset);
            }
            Err(e) => warn!("Failed to scrape dataset {}: {}", name, e),
        }
        sleep(Duration::from_millis(cfg.api_delay_ms)).await;
    }
    Ok(datasets)
}

/// GET one action URL and unwrap the CKAN envelope.
async fn call_action<T: DeserializeOwned>(fetcher: &Fetcher, url: &str) -> Result<T> {
    let res = fetcher.fetch(url).await?;
    let envelope: Envelope<T> = serde_json::from_str(&res.raw_body)
        .with_context(|| format!("malformed CKAN response from {url}"))?;
    if !envelope.success {
        bail!("CKAN action reported failure for {url}");
    }
    envelope
        .result
        .with_context(|| format!("CKAN response from {url} carried no result"))
}

fn dataset_from_package(pkg: Package, cfg: &RunConfig) -> ApiDataset {
    let url = cfg.dataset_url(&pkg.name);
    let organization = pkg
        .organization
        .map(|o| o.title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| cfg.organization.clone());
    ApiDataset {
        url,
        organization,
        title: pkg.title,
        description: pkg.notes.unwrap_or_default(),
        tags: pkg.tags.into_iter().map(|t| t.name).collect(),
        license: pkg.license_title.unwrap_or_default(),
        created: pkg.metadata_created.unwrap_or_default(),
        last_updated: pkg.metadata_modified.unwrap_or_default(),
        author: pkg.author.unwrap_or_default(),
        maintainer: pkg.maintainer.unwrap_or_default(),
        maintainer_email: pkg.maintainer_email.unwrap_or_default(),
        resources: pkg.resources.into_iter().map(resource_from_ref).collect(),
        name: pkg.name,
    }
}

fn resource_from_ref(res: ResourceRef) -> ApiResource {
    ApiResource {
        name: res.name.unwrap_or_default(),
        description: res.description.unwrap_or_default(),
        url: res.url.unwrap_or_default(),
        format: res.format.unwrap_or_default().to_uppercase(),
        size: res.size.map(size_label).unwrap_or_default(),
        mimetype: res.mimetype.unwrap_or_default(),
        created: res.created.unwrap_or_default(),
        last_modified: res.last_modified.unwrap_or_default(),
    }
}

fn size_label(size: Value) -> String {
    match size {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        _ => String::new(),
    }
}
