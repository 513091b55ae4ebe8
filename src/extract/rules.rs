use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

use super::element_text;

/// How to pull a value out of a matched element.
#[derive(Debug, Clone, Copy)]
pub enum Capture {
    /// Element text content.
    Text,
    /// A named attribute.
    Attr(&'static str),
    /// Element text, falling back to a named attribute when the text is empty.
    TextThenAttr(&'static str),
}

/// One CSS selector candidate for a field. Fields are described by ordered
/// probe lists; see [`resolve_first`] and [`resolve_all`] for the two
/// evaluation policies.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub selector: &'static str,
    pub capture: Capture,
}

impl Probe {
    pub const fn text(selector: &'static str) -> Self {
        Self {
            selector,
            capture: Capture::Text,
        }
    }

    pub const fn attr(selector: &'static str, attr: &'static str) -> Self {
        Self {
            selector,
            capture: Capture::Attr(attr),
        }
    }

    pub const fn text_then_attr(selector: &'static str, attr: &'static str) -> Self {
        Self {
            selector,
            capture: Capture::TextThenAttr(attr),
        }
    }
}

/// First-match-wins policy for scalar fields: probes are tried in order and
/// the first non-empty capture is returned. An unparsable selector or a
/// selector with no match simply falls through to the next probe.
pub fn resolve_first(doc: &Html, probes: &[Probe]) -> Option<String> {
    resolve_first_with(doc, probes).map(|(_, value)| value)
}

/// Like [`resolve_first`], but also reports which selector produced the value.
pub fn resolve_first_with(doc: &Html, probes: &[Probe]) -> Option<(&'static str, String)> {
    probes.iter().find_map(|p| {
        let sel = Selector::parse(p.selector).ok()?;
        let el = doc.select(&sel).next()?;
        let value = capture_value(&el, p.capture);
        (!value.is_empty()).then_some((p.selector, value))
    })
}

/// Union policy for tags and resources: every match of every probe is
/// collected, empties dropped, duplicates removed keeping first-occurrence
/// order. Deliberately not the same tie-break as [`resolve_first`].
pub fn resolve_all(doc: &Html, probes: &[Probe]) -> Vec<String> {
    probes
        .iter()
        .filter_map(|p| Selector::parse(p.selector).ok().map(|sel| (sel, p.capture)))
        .flat_map(|(sel, capture)| {
            doc.select(&sel)
                .map(|el| capture_value(&el, capture))
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unique()
        .collect()
}

fn capture_value(el: &ElementRef, capture: Capture) -> String {
    match capture {
        Capture::Text => element_text(el),
        Capture::Attr(name) => el.value().attr(name).unwrap_or_default().trim().to_string(),
        Capture::TextThenAttr(name) => {
            let text = element_text(el);
            if text.is_empty() {
                el.value().attr(name).unwrap_or_default().trim().to_string()
            } else {
                text
            }
        }
    }
}
