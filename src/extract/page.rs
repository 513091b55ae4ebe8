use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use super::element_text;

/// Everything worth knowing about a saved portal page, gathered without
/// touching the network.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageReport {
    pub metadata: PageMetadata,
    pub navigation: Navigation,
    pub search: SearchInfo,
    pub listing: ListingInfo,
    pub rss: RssInfo,
    pub contact: ContactInfo,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub language: String,
    pub charset: String,
    pub viewport: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
    pub full_url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Navigation {
    pub main_menu: Vec<PageLink>,
    pub category_links: Vec<PageLink>,
    pub provider_links: Vec<PageLink>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchInfo {
    pub form: SearchForm,
    pub filters: Vec<SearchFilter>,
    pub sort_options: Vec<SelectOption>,
    pub api_endpoints: Vec<PageLink>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchForm {
    pub action: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchFilter {
    pub id: String,
    pub name: String,
    pub data_url: String,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingInfo {
    pub total_results: u64,
    pub api_endpoint: String,
    pub templates: Vec<TemplatePreview>,
    pub pagination_range: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplatePreview {
    pub id: String,
    pub preview: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RssInfo {
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub footer_links: Vec<PageLink>,
}

/// Inspect a saved portal page. Anything the page lacks comes back empty,
/// never as an error.
pub fn inspect(html: &str, base: &Url) -> PageReport {
    let doc = Html::parse_document(html);
    PageReport {
        metadata: metadata(&doc),
        navigation: navigation(&doc, base),
        search: search(&doc, base),
        listing: listing(&doc, base),
        rss: rss(&doc),
        contact: contact(&doc, base),
    }
}

fn metadata(doc: &Html) -> PageMetadata {
    PageMetadata {
        title: first_text(doc, "title"),
        description: first_attr(doc, r#"meta[name="description"]"#, "content"),
        language: first_attr(doc, "html", "lang"),
        charset: first_attr(doc, "meta[charset]", "charset"),
        viewport: first_attr(doc, r#"meta[name="viewport"]"#, "content"),
    }
}

fn navigation(doc: &Html, base: &Url) -> Navigation {
    Navigation {
        main_menu: links_matching(doc, "nav.menu a.menu__link", base),
        category_links: links_matching(doc, r#"a[href*="/en-datasets/category/"]"#, base),
        provider_links: links_matching(doc, r#"a[href*="/en/providers"]"#, base),
    }
}

fn search(doc: &Html, base: &Url) -> SearchInfo {
    let option_sel = sel("option");

    let form = doc
        .select(&sel("form#form-dataset-search"))
        .next()
        .map(|el| SearchForm {
            action: attr_of(&el, "action"),
            method: attr_of(&el, "method"),
        })
        .unwrap_or_default();

    let filters = doc
        .select(&sel("select.dataset-search__select"))
        .filter_map(|select| {
            let id = select.value().attr("id")?.to_string();
            Some(SearchFilter {
                id,
                name: attr_of(&select, "name"),
                data_url: attr_of(&select, "data-url"),
                options: options_of(&select, &option_sel),
            })
        })
        .collect();

    let sort_options = doc
        .select(&sel("select#dataset-search-sort"))
        .next()
        .map(|el| options_of(&el, &option_sel))
        .unwrap_or_default();

    SearchInfo {
        form,
        filters,
        sort_options,
        api_endpoints: links_matching(doc, r#"a[href*="/api/"]"#, base),
    }
}

fn listing(doc: &Html, base: &Url) -> ListingInfo {
    let total_results = doc
        .select(&sel("span.dataset-listing__total-num"))
        .next()
        .and_then(|el| element_text(&el).parse::<u64>().ok())
        .unwrap_or(0);

    let api_endpoint = doc
        .select(&sel("div#dataset-listing"))
        .next()
        .and_then(|el| el.value().attr("data-url"))
        .and_then(|u| base.join(u).ok())
        .map(|u| u.to_string())
        .unwrap_or_default();

    let templates = doc
        .select(&sel("template"))
        .filter_map(|el| {
            let id = el.value().attr("id")?.to_string();
            Some(TemplatePreview {
                id,
                preview: element_text(&el).chars().take(200).collect(),
            })
        })
        .collect();

    let pagination_range = doc
        .select(&sel(".dataset-listing__pagination .dataset-listing__range"))
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    ListingInfo {
        total_results,
        api_endpoint,
        templates,
        pagination_range,
    }
}

fn rss(doc: &Html) -> RssInfo {
    let url = doc
        .select(&sel(r#"a[href*="data_rss_en.xml"]"#))
        .next()
        .and_then(|el| el.value().attr("href"))
        .unwrap_or_default()
        .to_string();
    let description = doc
        .select(&sel("p"))
        .map(|el| element_text(&el))
        .find(|t| t.contains("This daily updated RSS feed"))
        .unwrap_or_default();
    RssInfo { url, description }
}

fn contact(doc: &Html, base: &Url) -> ContactInfo {
    let email = doc
        .select(&sel(r#"a[href^="mailto:"]"#))
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(|h| h.trim_start_matches("mailto:").to_string())
        .unwrap_or_default();
    // The 1823 hotline is the only phone number the portal footer carries.
    let phone = doc
        .select(&sel("span"))
        .map(|el| element_text(&el))
        .find(|t| t.contains("183 5500"))
        .unwrap_or_default();
    ContactInfo {
        email,
        phone,
        footer_links: links_matching(doc, ".foot-row a", base),
    }
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).unwrap()
}

fn first_text(doc: &Html, selector: &str) -> String {
    doc.select(&sel(selector))
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default()
}

fn first_attr(doc: &Html, selector: &str, attr: &str) -> String {
    doc.select(&sel(selector))
        .next()
        .and_then(|el| el.value().attr(attr))
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn attr_of(el: &ElementRef, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().trim().to_string()
}

fn options_of(select: &ElementRef, option_sel: &Selector) -> Vec<SelectOption> {
    select
        .select(option_sel)
        .map(|opt| SelectOption {
            value: attr_of(&opt, "value"),
            text: element_text(&opt),
            selected: opt.value().attr("selected").is_some(),
        })
        .collect()
}

fn links_matching(doc: &Html, selector: &str, base: &Url) -> Vec<PageLink> {
    doc.select(&sel(selector))
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            Some(PageLink {
                text: element_text(&el),
                href: href.to_string(),
                full_url: base.join(href).map(|u| u.to_string()).unwrap_or_default(),
            })
        })
        .collect()
}
