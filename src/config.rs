use anyhow::Result;
use serde::{Deserialize, Serialize};

/// All knobs for one scraping run. Defaults mirror the portal setup this tool
/// was written for; any field can be overridden through `HKO_*` environment
/// variables (e.g. `HKO_MAX_RETRIES=5`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Open-data portal root.
    pub base_url: String,
    /// Provider agency's own website root.
    pub agency_url: String,
    /// Provider slug on the portal (listing pages, search filter).
    pub provider: String,
    /// Organization label stamped on every extracted record.
    pub organization: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Attempts per URL, first try included.
    pub max_retries: u32,
    /// First retry waits this long; each further retry doubles it.
    pub base_backoff_ms: u64,
    /// Pause between consecutive requests.
    pub request_delay_ms: u64,
    /// Pause between listing pages during pagination.
    pub page_delay_ms: u64,
    /// Pause between CKAN API calls.
    pub api_delay_ms: u64,
    /// Pagination cap for the provider listing.
    pub max_pages: u32,
    pub output_dir: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data.gov.hk".into(),
            agency_url: "https://www.hko.gov.hk".into(),
            provider: "hk-hko".into(),
            organization: "Hong Kong Observatory".into(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .into(),
            timeout_secs: 30,
            max_retries: 3,
            base_backoff_ms: 1000,
            request_delay_ms: 1000,
            page_delay_ms: 2000,
            api_delay_ms: 500,
            max_pages: 10,
            output_dir: "reports".into(),
        }
    }
}

impl RunConfig {
    /// Defaults layered under `HKO_*` environment overrides.
    pub fn load() -> Result<Self> {
        let defaults = config::Config::try_from(&RunConfig::default())?;
        let cfg = config::Config::builder()
            .add_source(defaults)
            .add_source(config::Environment::with_prefix("HKO"))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    pub fn provider_listing_url(&self) -> String {
        format!("{}/en-datasets/provider/{}", self.base_url, self.provider)
    }

    pub fn search_url(&self, term: &str) -> String {
        format!(
            "{}/en-datasets?q={}&organization={}",
            self.base_url, term, self.provider
        )
    }

    /// Provider-filtered listing without a search term.
    pub fn provider_filter_url(&self) -> String {
        format!("{}/en-datasets?organization={}", self.base_url, self.provider)
    }

    pub fn listing_page_url(&self, page: u32) -> String {
        format!(
            "{}/en-datasets?organization={}&page={}",
            self.base_url, self.provider, page
        )
    }

    pub fn dataset_url(&self, slug: &str) -> String {
        format!("{}/en-dataset/{}", self.base_url, slug)
    }

    /// CKAN Action API calls, parameterized on the provider slug.
    pub fn organization_show_url(&self) -> String {
        format!(
            "{}/api/3/action/organization_show?id={}",
            self.base_url, self.provider
        )
    }

    pub fn package_list_url(&self) -> String {
        format!(
            "{}/api/3/action/package_list?id={}",
            self.base_url, self.provider
        )
    }

    pub fn package_show_url(&self, name: &str) -> String {
        format!("{}/api/3/action/package_show?id={}", self.base_url, name)
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Section page on the agency's own website, e.g. `/en/climate/`.
    pub fn agency_section_url(&self, section: &str) -> String {
        format!("{}/en/{}/", self.agency_url, section)
    }
}
