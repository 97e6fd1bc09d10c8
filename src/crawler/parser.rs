//! HTML parser for extracting page content
//!
//! This module handles parsing HTML content to extract:
//! - The page title
//! - Headings (`h1`..`h6`) in document order
//! - Raw `href` values of anchors in document order

use crate::ProbeError;
use scraper::{Html, Selector};

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";
const ANCHOR_SELECTOR: &str = "a[href]";
const TITLE_SELECTOR: &str = "title";

/// A heading found in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedHeading {
    /// Lowercase tag name, `h1` through `h6`
    pub tag: String,
    /// Trimmed text content, never empty
    pub text: String,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Trimmed page title; empty when the document has none
    pub title: String,

    /// Non-empty headings in document order
    pub headings: Vec<ExtractedHeading>,

    /// Non-blank anchor hrefs in document order, as written in the markup
    pub hrefs: Vec<String>,
}

/// Parses HTML content and extracts title, headings and anchor hrefs
///
/// # Extraction Rules
///
/// - Headings with empty (or whitespace-only) text are skipped
/// - Anchors without an `href`, or with a blank one, are skipped
/// - Every other anchor is kept, whatever its scheme; resolution and
///   classification happen later against the page address
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `url` - Address of the page, used only for error reporting
///
/// # Example
///
/// ```
/// use siteprobe::crawler::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><h1>Hi</h1><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_html(html, "http://example.com/").unwrap();
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.hrefs, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str, url: &str) -> Result<ParsedPage, ProbeError> {
    let title_selector = selector(TITLE_SELECTOR, url)?;
    let heading_selector = selector(HEADING_SELECTOR, url)?;
    let anchor_selector = selector(ANCHOR_SELECTOR, url)?;

    let document = Html::parse_document(html);

    Ok(ParsedPage {
        title: extract_title(&document, &title_selector),
        headings: extract_headings(&document, &heading_selector),
        hrefs: extract_hrefs(&document, &anchor_selector),
    })
}

fn selector(css: &str, url: &str) -> Result<Selector, ProbeError> {
    Selector::parse(css).map_err(|e| ProbeError::HtmlParse {
        url: url.to_string(),
        message: format!("invalid selector {:?}: {:?}", css, e),
    })
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html, title_selector: &Selector) -> String {
    document
        .select(title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_headings(document: &Html, heading_selector: &Selector) -> Vec<ExtractedHeading> {
    document
        .select(heading_selector)
        .filter_map(|element| {
            let text = element.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(ExtractedHeading {
                tag: element.value().name().to_string(),
                text,
            })
        })
        .collect()
}

fn extract_hrefs(document: &Html, anchor_selector: &Selector) -> Vec<String> {
    document
        .select(anchor_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(str::to_string)
        .collect()
}
