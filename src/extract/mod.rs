pub mod dataset;
pub mod page;
pub mod rules;

/// Collapse an element's text nodes into one trimmed string.
pub(crate) fn element_text(el: &scraper::ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Visible text of the whole document.
pub(crate) fn document_text(doc: &scraper::Html) -> String {
    doc.root_element().text().collect()
}
