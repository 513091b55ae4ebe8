use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use itertools::Itertools;
use serde::Serialize;
use std::fmt::Write;
use tracing::info;

use crate::api::ApiDataset;
use crate::config::RunConfig;
use crate::endpoints::{CheckStatus, EndpointCheck};
use crate::extract::dataset::DatasetRecord;
use crate::extract::page::PageReport;
use crate::survey::SurveyFindings;

/// Default keyword list for the focused-report filter.
pub const FILTER_KEYWORDS: &[&str] = &[
    "hko",
    "observatory",
    "weather",
    "climate",
    "meteorological",
    "temperature",
    "rainfall",
    "humidity",
    "wind",
    "typhoon",
    "forecast",
    "warning",
    "radar",
    "satellite",
    "lightning",
    "tide",
    "radiation",
    "air quality",
    "atmospheric",
];

pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generated_at() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn ensure_output_dir(dir: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create output dir {dir}"))?;
    Ok(PathBuf::from(dir))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    info!("JSON report saved: {}", path.display());
    Ok(())
}

fn write_markdown(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Markdown report saved: {}", path.display());
    Ok(())
}

// ── Scrape run reports ──

/// JSON, CSV and Markdown renditions of one run's records.
pub fn write_run_reports(
    dir: &Path,
    stamp: &str,
    records: &[DatasetRecord],
    cfg: &RunConfig,
) -> Result<Vec<PathBuf>> {
    let json = dir.join(format!("hko_datasets_report_{stamp}.json"));
    write_json(&json, &records)?;

    let csv = dir.join(format!("hko_datasets_report_{stamp}.csv"));
    write_records_csv(&csv, records)?;
    info!("CSV report saved: {}", csv.display());

    let md = dir.join(format!("hko_datasets_report_{stamp}.md"));
    write_markdown(&md, &render_run_markdown(records, cfg, &generated_at())?)?;

    Ok(vec![json, csv, md])
}

/// Nested fields flatten into `"; "`-joined cells; resources render as
/// `name (FORMAT)`.
pub fn write_records_csv(path: &Path, records: &[DatasetRecord]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    w.write_record([
        "name",
        "url",
        "title",
        "description",
        "organization",
        "tags",
        "formats",
        "resources",
        "created_at",
        "updated_at",
        "license",
        "author",
    ])?;
    for r in records {
        let tags = r.tags.join("; ");
        let formats = r.formats.join("; ");
        let resources = r
            .resources
            .iter()
            .map(|res| format!("{} ({})", res.name, res.format))
            .join("; ");
        w.write_record([
            r.name.as_str(),
            r.url.as_str(),
            r.title.as_str(),
            r.description.as_str(),
            r.organization.as_str(),
            tags.as_str(),
            formats.as_str(),
            resources.as_str(),
            r.created_at.as_str(),
            r.updated_at.as_str(),
            r.license.as_str(),
            r.author.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn render_run_markdown(
    records: &[DatasetRecord],
    cfg: &RunConfig,
    generated_at: &str,
) -> Result<String> {
    let mut md = String::new();
    writeln!(md, "# {} Datasets Report\n", cfg.organization)?;
    writeln!(md, "**Generated on:** {generated_at}")?;
    writeln!(md, "**Total Datasets:** {}", records.len())?;
    writeln!(md, "**Organization:** {} ({})\n", cfg.organization, cfg.provider)?;

    writeln!(md, "## Executive Summary\n")?;
    writeln!(
        md,
        "This report provides a comprehensive overview of all {} datasets \
         available from the {} through the open-data portal.\n",
        records.len(),
        cfg.organization
    )?;
    let total_resources: usize = records.iter().map(|r| r.resources.len()).sum();
    writeln!(md, "**Total Resources:** {total_resources}\n")?;

    let format_counts = count_sorted(records.iter().flat_map(|r| &r.formats));
    if !format_counts.is_empty() {
        writeln!(md, "## Data Formats Available\n")?;
        for (format, count) in format_counts {
            writeln!(md, "- **{}**: {} datasets", format.to_uppercase(), count)?;
        }
        writeln!(md)?;
    }

    let tag_counts = count_sorted(records.iter().flat_map(|r| &r.tags));
    if !tag_counts.is_empty() {
        writeln!(md, "## Dataset Categories (Tags)\n")?;
        for (tag, count) in tag_counts {
            writeln!(md, "- **{tag}**: {count} datasets")?;
        }
        writeln!(md)?;
    }

    writeln!(md, "## Detailed Dataset Information\n")?;
    for (i, r) in records.iter().enumerate() {
        writeln!(md, "### {}. {}\n", i + 1, r.title)?;
        writeln!(md, "**Dataset Name:** `{}`\n", r.name)?;
        writeln!(md, "**URL:** {}\n", r.url)?;
        if !r.description.is_empty() {
            writeln!(md, "**Description:** {}\n", r.description)?;
        }
        if !r.tags.is_empty() {
            writeln!(md, "**Tags:** {}\n", r.tags.join(", "))?;
        }
        if !r.author.is_empty() {
            writeln!(md, "**Author:** {}\n", r.author)?;
        }
        if !r.license.is_empty() {
            writeln!(md, "**License:** {}\n", r.license)?;
        }
        if !r.created_at.is_empty() {
            writeln!(md, "**Created:** {}\n", r.created_at)?;
        }
        if !r.updated_at.is_empty() {
            writeln!(md, "**Last Updated:** {}\n", r.updated_at)?;
        }
        if !r.resources.is_empty() {
            writeln!(md, "**Available Resources ({}):**\n", r.resources.len())?;
            for (j, res) in r.resources.iter().enumerate() {
                writeln!(md, "{}. **{}**", j + 1, res.name)?;
                writeln!(md, "   - Format: {}", res.format)?;
                writeln!(md, "   - URL: [{}]({})\n", res.url, res.url)?;
            }
        }
        writeln!(md, "---\n")?;
    }
    Ok(md)
}

/// Occurrence counts, most frequent first; ties break alphabetically so the
/// rendering is stable.
fn count_sorted<'a>(values: impl Iterator<Item = &'a String>) -> Vec<(&'a String, usize)> {
    let mut counts: Vec<(&String, usize)> = values.counts().into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    counts
}

// ── CKAN API reports ──

/// JSON, CSV and Markdown renditions of one API inventory scrape.
pub fn write_api_reports(
    dir: &Path,
    stamp: &str,
    datasets: &[ApiDataset],
    cfg: &RunConfig,
) -> Result<Vec<PathBuf>> {
    let json = dir.join(format!("hko_datasets_detailed_report_{stamp}.json"));
    write_json(&json, &datasets)?;

    let csv = dir.join(format!("hko_datasets_detailed_report_{stamp}.csv"));
    write_api_csv(&csv, datasets)?;
    info!("CSV report saved: {}", csv.display());

    let md = dir.join(format!("hko_datasets_detailed_report_{stamp}.md"));
    write_markdown(&md, &render_api_markdown(datasets, cfg, &generated_at())?)?;

    Ok(vec![json, csv, md])
}

/// One row per dataset; resources reduce to a count and a format summary.
fn write_api_csv(path: &Path, datasets: &[ApiDataset]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    w.write_record([
        "name",
        "title",
        "description",
        "url",
        "organization",
        "tags",
        "license",
        "last_updated",
        "created",
        "author",
        "maintainer",
        "maintainer_email",
        "total_resources",
        "resource_formats",
    ])?;
    for d in datasets {
        let tags = d.tags.join("; ");
        let formats = d
            .resources
            .iter()
            .map(|r| r.format.as_str())
            .filter(|f| !f.is_empty())
            .unique()
            .join("; ");
        let total = d.resources.len().to_string();
        w.write_record([
            d.name.as_str(),
            d.title.as_str(),
            d.description.as_str(),
            d.url.as_str(),
            d.organization.as_str(),
            tags.as_str(),
            d.license.as_str(),
            d.last_updated.as_str(),
            d.created.as_str(),
            d.author.as_str(),
            d.maintainer.as_str(),
            d.maintainer_email.as_str(),
            total.as_str(),
            formats.as_str(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn render_api_markdown(
    datasets: &[ApiDataset],
    cfg: &RunConfig,
    generated_at: &str,
) -> Result<String> {
    let mut md = String::new();
    writeln!(md, "# {} Datasets - Detailed Report\n", cfg.organization)?;
    writeln!(md, "**Generated on:** {generated_at}")?;
    writeln!(md, "**Total Datasets:** {}", datasets.len())?;
    writeln!(md, "**Organization:** {} ({})\n", cfg.organization, cfg.provider)?;

    writeln!(md, "## Executive Summary\n")?;
    writeln!(
        md,
        "This report provides a comprehensive overview of all {} datasets \
         available from the {} through the open-data portal.\n",
        datasets.len(),
        cfg.organization
    )?;
    let total_resources: usize = datasets.iter().map(|d| d.resources.len()).sum();
    writeln!(md, "**Total Resources:** {total_resources}\n")?;

    let format_counts = count_sorted(
        datasets
            .iter()
            .flat_map(|d| &d.resources)
            .map(|r| &r.format)
            .filter(|f| !f.is_empty()),
    );
    if !format_counts.is_empty() {
        writeln!(md, "## Data Formats Available\n")?;
        for (format, count) in format_counts {
            writeln!(md, "- **{format}**: {count} resources")?;
        }
        writeln!(md)?;
    }

    let tag_counts = count_sorted(
        datasets
            .iter()
            .flat_map(|d| &d.tags)
            .filter(|t| !t.is_empty()),
    );
    if !tag_counts.is_empty() {
        writeln!(md, "## Dataset Categories (Tags)\n")?;
        for (tag, count) in tag_counts {
            writeln!(md, "- **{tag}**: {count} datasets")?;
        }
        writeln!(md)?;
    }

    writeln!(md, "## Detailed Dataset Information\n")?;
    for (i, d) in datasets.iter().enumerate() {
        writeln!(md, "### {}. {}\n", i + 1, d.title)?;
        writeln!(md, "**Dataset Name:** `{}`\n", d.name)?;
        writeln!(md, "**URL:** {}\n", d.url)?;
        if !d.description.is_empty() {
            writeln!(md, "**Description:** {}\n", d.description)?;
        }
        if !d.tags.is_empty() {
            writeln!(md, "**Tags:** {}\n", d.tags.join(", "))?;
        }
        if !d.author.is_empty() {
            writeln!(md, "**Author:** {}\n", d.author)?;
        }
        if !d.maintainer.is_empty() {
            if d.maintainer_email.is_empty() {
                writeln!(md, "**Maintainer:** {}\n", d.maintainer)?;
            } else {
                writeln!(
                    md,
                    "**Maintainer:** {} ({})\n",
                    d.maintainer, d.maintainer_email
                )?;
            }
        }
        if !d.license.is_empty() {
            writeln!(md, "**License:** {}\n", d.license)?;
        }
        if !d.created.is_empty() {
            writeln!(md, "**Created:** {}\n", d.created)?;
        }
        if !d.last_updated.is_empty() {
            writeln!(md, "**Last Updated:** {}\n", d.last_updated)?;
        }
        if !d.resources.is_empty() {
            writeln!(md, "**Available Resources ({}):**\n", d.resources.len())?;
            for (j, res) in d.resources.iter().enumerate() {
                writeln!(md, "{}. **{}**", j + 1, res.name)?;
                writeln!(md, "   - Format: {}", res.format)?;
                writeln!(md, "   - URL: [{}]({})", res.url, res.url)?;
                if !res.description.is_empty() {
                    writeln!(md, "   - Description: {}", res.description)?;
                }
                if !res.size.is_empty() {
                    writeln!(md, "   - Size: {}", res.size)?;
                }
                if !res.last_modified.is_empty() {
                    writeln!(md, "   - Last Modified: {}", res.last_modified)?;
                }
                writeln!(md)?;
            }
        }
        writeln!(md, "---\n")?;
    }
    Ok(md)
}

// ── Offline inspection reports ──

pub fn write_inspection_reports(
    dir: &Path,
    stamp: &str,
    report: &PageReport,
    source: &str,
) -> Result<Vec<PathBuf>> {
    let json = dir.join(format!("html_extraction_report_{stamp}.json"));
    write_json(&json, report)?;

    let csv = dir.join(format!("html_extraction_report_{stamp}.csv"));
    write_navigation_csv(&csv, report)?;
    info!("CSV report saved: {}", csv.display());

    let md = dir.join(format!("html_extraction_report_{stamp}.md"));
    write_markdown(&md, &render_inspection_markdown(report, source, &generated_at())?)?;

    Ok(vec![json, csv, md])
}

fn write_navigation_csv(path: &Path, report: &PageReport) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    w.write_record(["Type", "Text", "URL", "Full URL"])?;
    let groups = [
        ("Main Menu", &report.navigation.main_menu),
        ("Category", &report.navigation.category_links),
        ("Provider", &report.navigation.provider_links),
    ];
    for (kind, links) in groups {
        for link in links {
            w.write_record([
                kind,
                link.text.as_str(),
                link.href.as_str(),
                link.full_url.as_str(),
            ])?;
        }
    }
    w.flush()?;
    Ok(())
}

fn render_inspection_markdown(
    report: &PageReport,
    source: &str,
    generated_at: &str,
) -> Result<String> {
    let mut md = String::new();
    writeln!(md, "# Portal Page Analysis Report\n")?;
    writeln!(md, "**Generated on:** {generated_at}")?;
    writeln!(md, "**Source:** {source}\n")?;

    writeln!(md, "## Page Metadata\n")?;
    writeln!(md, "- **Title:** {}", or_na(&report.metadata.title))?;
    writeln!(md, "- **Description:** {}", or_na(&report.metadata.description))?;
    writeln!(md, "- **Language:** {}", or_na(&report.metadata.language))?;
    writeln!(md, "- **Charset:** {}\n", or_na(&report.metadata.charset))?;

    writeln!(md, "## Navigation Links\n")?;
    writeln!(md, "### Main Menu ({})", report.navigation.main_menu.len())?;
    for link in &report.navigation.main_menu {
        writeln!(md, "- [{}]({})", link.text, link.full_url)?;
    }
    writeln!(
        md,
        "\n### Category Links ({})",
        report.navigation.category_links.len()
    )?;
    for link in &report.navigation.category_links {
        writeln!(md, "- [{}]({})", link.text, link.full_url)?;
    }

    writeln!(md, "\n## Search Functionality\n")?;
    writeln!(md, "### Filters ({})", report.search.filters.len())?;
    for filter in &report.search.filters {
        writeln!(md, "- **{}**: {}", filter.id, or_na(&filter.name))?;
        writeln!(md, "  - Data URL: {}", or_na(&filter.data_url))?;
        writeln!(md, "  - Options: {}", filter.options.len())?;
    }
    writeln!(
        md,
        "\n### Sorting Options ({})",
        report.search.sort_options.len()
    )?;
    for option in &report.search.sort_options {
        writeln!(md, "- {} ({})", option.text, option.value)?;
    }

    writeln!(md, "\n## Dataset Listing Information\n")?;
    writeln!(md, "- **Total Results:** {}", report.listing.total_results)?;
    writeln!(md, "- **API Endpoint:** {}", or_na(&report.listing.api_endpoint))?;
    writeln!(md, "- **Templates:** {}", report.listing.templates.len())?;

    writeln!(md, "\n## RSS Feed Information\n")?;
    writeln!(md, "- **RSS URL:** {}", or_na(&report.rss.url))?;
    writeln!(md, "- **Description:** {}", or_na(&report.rss.description))?;

    writeln!(md, "\n## Contact Information\n")?;
    writeln!(md, "- **Email:** {}", or_na(&report.contact.email))?;
    writeln!(md, "- **Phone:** {}", or_na(&report.contact.phone))?;
    Ok(md)
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

// ── Endpoint check reports ──

pub fn write_endpoint_reports(
    dir: &Path,
    stamp: &str,
    checks: &[EndpointCheck],
) -> Result<Vec<PathBuf>> {
    let json = dir.join(format!("api_endpoints_check_{stamp}.json"));
    write_json(&json, &checks)?;

    let md = dir.join(format!("api_endpoints_check_{stamp}.md"));
    write_markdown(&md, &render_endpoints_markdown(checks, &generated_at())?)?;

    Ok(vec![json, md])
}

fn render_endpoints_markdown(checks: &[EndpointCheck], generated_at: &str) -> Result<String> {
    let mut md = String::new();
    writeln!(md, "# API Endpoints Check Report\n")?;
    writeln!(md, "**Generated on:** {generated_at}\n")?;

    let successful = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Success)
        .count();
    writeln!(md, "## Summary\n")?;
    writeln!(md, "- **Successful endpoints:** {}/{}", successful, checks.len())?;
    writeln!(
        md,
        "- **Failed endpoints:** {}/{}\n",
        checks.len() - successful,
        checks.len()
    )?;

    writeln!(md, "## Detailed Results\n")?;
    for check in checks {
        writeln!(md, "### {}", check.name)?;
        writeln!(md, "- **URL:** {}", check.url)?;
        match check.status {
            CheckStatus::Success => {
                writeln!(md, "- **Status:** success")?;
                if let Some(code) = check.status_code {
                    writeln!(md, "- **HTTP Code:** {code}")?;
                }
                writeln!(md, "- **Content-Type:** {}", or_na(&check.content_type))?;
                writeln!(md, "- **Size:** {} bytes", check.size)?;
                if !check.json_keys.is_empty() {
                    writeln!(md, "- **Keys:** {}", check.json_keys.join(", "))?;
                }
                if !check.rss_titles.is_empty() {
                    writeln!(md, "- **Feed items:** {}", check.rss_titles.len())?;
                    for title in check.rss_titles.iter().take(5) {
                        writeln!(md, "  - {title}")?;
                    }
                }
            }
            CheckStatus::Error => {
                writeln!(md, "- **Status:** error")?;
                if let Some(code) = check.status_code {
                    writeln!(md, "- **HTTP Code:** {code}")?;
                }
                writeln!(
                    md,
                    "- **Error:** {}",
                    check.error.as_deref().unwrap_or("Unknown error")
                )?;
            }
        }
        writeln!(md)?;
    }
    Ok(md)
}

// ── Agency survey report ──

pub fn write_survey_report(
    dir: &Path,
    stamp: &str,
    findings: &SurveyFindings,
    cfg: &RunConfig,
) -> Result<PathBuf> {
    let md = dir.join(format!("hko_website_findings_{stamp}.md"));
    write_markdown(&md, &render_survey_markdown(findings, cfg, &generated_at())?)?;
    Ok(md)
}

fn render_survey_markdown(
    findings: &SurveyFindings,
    cfg: &RunConfig,
    generated_at: &str,
) -> Result<String> {
    let mut md = String::new();
    writeln!(md, "# {} Website Analysis\n", cfg.organization)?;
    writeln!(md, "**Generated on:** {generated_at}")?;
    writeln!(md, "**Base URL:** {}\n", cfg.agency_url)?;

    writeln!(md, "## Found Data-Related Pages ({})\n", findings.pages.len())?;
    for (i, page) in findings.pages.iter().enumerate() {
        writeln!(md, "### {}. {}", i + 1, page.title)?;
        writeln!(md, "**URL:** {}", page.url)?;
        writeln!(md, "**Content Length:** {} characters\n", page.content_length)?;
    }

    writeln!(md, "## Data Links Found ({})\n", findings.links.len())?;
    for (i, link) in findings.links.iter().enumerate() {
        writeln!(md, "{}. **{}**", i + 1, link.text)?;
        writeln!(md, "   - URL: {}\n", link.url)?;
    }
    Ok(md)
}

// ── Keyword filter ──

/// Load a JSON record report written by a previous run.
pub fn load_records(path: &Path) -> Result<Vec<DatasetRecord>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse records from {}", path.display()))?;
    Ok(records)
}

/// Keep records whose textual fields mention any keyword, case-insensitively.
pub fn filter_records(records: &[DatasetRecord], keywords: &[&str]) -> Vec<DatasetRecord> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    records
        .iter()
        .filter(|r| record_matches(r, &keywords))
        .cloned()
        .collect()
}

fn record_matches(record: &DatasetRecord, keywords: &[String]) -> bool {
    let mut fields: Vec<&str> = vec![
        &record.name,
        &record.title,
        &record.description,
        &record.organization,
        &record.license,
        &record.author,
    ];
    fields.extend(record.tags.iter().map(String::as_str));
    fields.extend(record.resources.iter().map(|r| r.name.as_str()));

    fields.iter().any(|text| {
        let lower = text.to_lowercase();
        keywords.iter().any(|kw| lower.contains(kw))
    })
}

pub fn write_filtered_reports(
    dir: &Path,
    stamp: &str,
    records: &[DatasetRecord],
) -> Result<Vec<PathBuf>> {
    let json = dir.join(format!("hko_filtered_report_{stamp}.json"));
    write_json(&json, &records)?;

    let csv = dir.join(format!("hko_filtered_report_{stamp}.csv"));
    write_records_csv(&csv, records)?;
    info!("CSV report saved: {}", csv.display());

    Ok(vec![json, csv])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResource;
    use crate::extract::dataset::Resource;

    fn sample_record() -> DatasetRecord {
        DatasetRecord {
            name: "daily-weather-summary".into(),
            url: "https://data.gov.hk/en-dataset/daily-weather-summary".into(),
            title: "Daily Weather Summary".into(),
            description: "Daily observations".into(),
            organization: "Hong Kong Observatory".into(),
            tags: vec!["Weather".into(), "Climate".into()],
            formats: vec!["csv".into(), "json".into()],
            resources: vec![Resource {
                name: "Report".into(),
                url: "https://data.gov.hk/report.csv".into(),
                format: "CSV".into(),
            }],
            created_at: String::new(),
            updated_at: "2024-06-30".into(),
            license: String::new(),
            author: String::new(),
        }
    }

    fn unrelated_record() -> DatasetRecord {
        DatasetRecord {
            name: "bus-routes".into(),
            title: "Bus Routes".into(),
            organization: "Transport Department".into(),
            ..DatasetRecord::default()
        }
    }

    #[test]
    fn filter_matches_on_tags() {
        let mut tagged = unrelated_record();
        tagged.name = "precipitation-records".into();
        tagged.tags = vec!["Rainfall".into()];
        let records = vec![tagged, unrelated_record()];

        let kept = filter_records(&records, FILTER_KEYWORDS);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "precipitation-records");
    }

    #[test]
    fn filter_is_case_insensitive() {
        let records = vec![sample_record()];
        assert_eq!(filter_records(&records, &["OBSERVATORY"]).len(), 1);
        assert!(filter_records(&records, &["maritime"]).is_empty());
    }

    #[test]
    fn csv_flattens_nested_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_records_csv(&path, &[sample_record()]).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("Weather; Climate"));
        assert!(body.contains("csv; json"));
        assert!(body.contains("Report (CSV)"));
    }

    #[test]
    fn run_markdown_sections() {
        let cfg = RunConfig::default();
        let md = render_run_markdown(&[sample_record()], &cfg, "2024-07-01 12:00:00").unwrap();
        assert!(md.contains("# Hong Kong Observatory Datasets Report"));
        assert!(md.contains("**Total Datasets:** 1"));
        assert!(md.contains("- **CSV**: 1 datasets"));
        assert!(md.contains("- **Weather**: 1 datasets"));
        assert!(md.contains("### 1. Daily Weather Summary"));
        assert!(md.contains("**Last Updated:** 2024-06-30"));
        // Empty fields stay out of the per-dataset section.
        assert!(!md.contains("**Created:**"));
    }

    #[test]
    fn run_reports_carry_the_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig::default();
        let files =
            write_run_reports(dir.path(), "20240701_120000", &[sample_record()], &cfg).unwrap();
        assert_eq!(files.len(), 3);
        for file in &files {
            assert!(file.exists());
            assert!(file
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .contains("20240701_120000"));
        }
    }

    fn sample_api_dataset() -> ApiDataset {
        ApiDataset {
            name: "daily-weather-summary".into(),
            title: "Daily Weather Summary".into(),
            description: "Daily observations".into(),
            url: "https://data.gov.hk/en-dataset/daily-weather-summary".into(),
            organization: "Hong Kong Observatory".into(),
            tags: vec!["Weather".into()],
            license: "Open Government Licence".into(),
            created: "2020-01-01".into(),
            last_updated: "2024-06-30".into(),
            author: String::new(),
            maintainer: "HKO Data Team".into(),
            maintainer_email: "data@hko.gov.hk".into(),
            resources: vec![
                ApiResource {
                    name: "Daily summary (CSV)".into(),
                    description: String::new(),
                    url: "https://data.gov.hk/files/daily.csv".into(),
                    format: "CSV".into(),
                    size: "20480".into(),
                    mimetype: "text/csv".into(),
                    created: String::new(),
                    last_modified: String::new(),
                },
                ApiResource {
                    name: "Daily summary (JSON)".into(),
                    description: String::new(),
                    url: "https://data.gov.hk/files/daily.json".into(),
                    format: "JSON".into(),
                    size: String::new(),
                    mimetype: "application/json".into(),
                    created: String::new(),
                    last_modified: String::new(),
                },
            ],
        }
    }

    #[test]
    fn api_csv_summarizes_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_api_csv(&path, &[sample_api_dataset()]).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("maintainer_email"));
        assert!(body.contains("data@hko.gov.hk,2,CSV; JSON"));
    }

    #[test]
    fn api_markdown_carries_maintainer_and_size() {
        let cfg = RunConfig::default();
        let md =
            render_api_markdown(&[sample_api_dataset()], &cfg, "2024-07-01 12:00:00").unwrap();
        assert!(md.contains("# Hong Kong Observatory Datasets - Detailed Report"));
        assert!(md.contains("**Maintainer:** HKO Data Team (data@hko.gov.hk)"));
        assert!(md.contains("- **CSV**: 1 resources"));
        assert!(md.contains("- Size: 20480"));
        // The JSON resource reports no size, so only one Size line renders.
        assert_eq!(md.matches("- Size:").count(), 1);
    }

    #[test]
    fn api_reports_carry_the_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig::default();
        let files =
            write_api_reports(dir.path(), "20240701_120000", &[sample_api_dataset()], &cfg)
                .unwrap();
        assert_eq!(files.len(), 3);
        for file in &files {
            assert!(file.exists());
            assert!(file
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("hko_datasets_detailed_report_20240701_120000"));
        }
    }

    #[test]
    fn filtered_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![sample_record(), unrelated_record()];
        let files = write_filtered_reports(dir.path(), "20240701_120000", &records).unwrap();

        let loaded = load_records(&files[0]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "Daily Weather Summary");
    }

    #[test]
    fn endpoints_markdown_counts_failures() {
        let checks = vec![
            EndpointCheck {
                name: "providers_json",
                url: "https://data.gov.hk/filestore/json/providers_en.json".into(),
                status: CheckStatus::Success,
                status_code: Some(200),
                content_type: "application/json".into(),
                size: 120,
                json_keys: vec!["providers".into()],
                rss_titles: Vec::new(),
                error: None,
            },
            EndpointCheck {
                name: "datasets_api",
                url: "https://data.gov.hk/api/v1/datasets".into(),
                status: CheckStatus::Error,
                status_code: Some(403),
                content_type: String::new(),
                size: 0,
                json_keys: Vec::new(),
                rss_titles: Vec::new(),
                error: Some("HTTP 403".into()),
            },
        ];
        let md = render_endpoints_markdown(&checks, "2024-07-01 12:00:00").unwrap();
        assert!(md.contains("- **Successful endpoints:** 1/2"));
        assert!(md.contains("- **Failed endpoints:** 1/2"));
        assert!(md.contains("- **Keys:** providers"));
        assert!(md.contains("- **Error:** HTTP 403"));
    }

    #[test]
    fn survey_markdown_lists_findings() {
        let cfg = RunConfig::default();
        let findings = SurveyFindings {
            pages: vec![crate::survey::FoundPage {
                url: "https://www.hko.gov.hk/en/climate/".into(),
                title: "Climate Service".into(),
                content_length: 2048,
            }],
            links: vec![crate::survey::DataLink {
                url: "https://www.hko.gov.hk/files/rainfall.csv".into(),
                text: "Rainfall CSV".into(),
            }],
        };
        let md = render_survey_markdown(&findings, &cfg, "2024-07-01 12:00:00").unwrap();
        assert!(md.contains("## Found Data-Related Pages (1)"));
        assert!(md.contains("**Content Length:** 2048 characters"));
        assert!(md.contains("## Data Links Found (1)"));
        assert!(md.contains("1. **Rainfall CSV**"));
    }
}
