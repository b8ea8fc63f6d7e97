//! Static DOM queries over a fetched HTML document.
//!
//! The document is re-parsed per query: `scraper::Html` is not `Send`, and
//! pages live inside spawned work units.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;

/// Elements whose text never renders.
const HIDDEN_TEXT_PARENTS: [&str; 4] = ["script", "style", "noscript", "template"];

pub(super) fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(selector, error = ?e, "invalid CSS selector");
            None
        }
    }
}

/// Rendered text of an element: text nodes outside script/style, trimmed and
/// joined by single spaces.
pub(super) fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|el| HIDDEN_TEXT_PARENTS.contains(&el.name()));
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

/// Visible text of every element matching `selector`, in document order.
pub(super) fn select_texts(html: &str, selector: &str) -> Vec<String> {
    let Some(parsed) = parse_selector(selector) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document.select(&parsed).map(visible_text).collect()
}

pub(super) fn first_text(html: &str, selector: &str) -> Option<String> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let first = document.select(&parsed).next().map(visible_text);
    first
}

pub(super) fn matches_any(html: &str, selectors: &[&str]) -> bool {
    let document = Html::parse_document(html);
    selectors
        .iter()
        .filter_map(|s| parse_selector(s))
        .any(|parsed| document.select(&parsed).next().is_some())
}

/// How a click on a static document is replayed.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ClickTarget {
    /// A form input: the server selects it from a `name=value` query pair.
    QueryPair { name: String, value: String },
    /// An anchor: follow its `href`.
    Link(String),
}

pub(super) fn click_target(html: &str, selector: &str) -> Result<ClickTarget, ScraperError> {
    let not_found = || ScraperError::ElementNotFound {
        selector: selector.to_owned(),
    };
    let parsed = parse_selector(selector).ok_or_else(not_found)?;
    let document = Html::parse_document(html);
    let element = document.select(&parsed).next().ok_or_else(not_found)?;
    let el = element.value();

    if el.name() == "input" {
        if let (Some(name), Some(value)) = (el.attr("name"), el.attr("value")) {
            return Ok(ClickTarget::QueryPair {
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }
    }
    if let Some(href) = el.attr("href") {
        return Ok(ClickTarget::Link(href.to_owned()));
    }

    Err(ScraperError::UnsupportedInteraction {
        selector: selector.to_owned(),
    })
}

/// Resolves the URL a click leads to. A query pair replaces any existing
/// pair with the same name.
pub(super) fn apply_click(base: &Url, target: ClickTarget) -> Result<Url, ScraperError> {
    match target {
        ClickTarget::QueryPair { name, value } => {
            let kept: Vec<(String, String)> = base
                .query_pairs()
                .filter(|(k, _)| *k != name)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            let mut next = base.clone();
            next.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair(&name, &value);
            Ok(next)
        }
        ClickTarget::Link(href) => base.join(&href).map_err(|e| ScraperError::InvalidUrl {
            url: href,
            reason: e.to_string(),
        }),
    }
}
