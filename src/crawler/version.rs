//! Markup version detection
//!
//! A cheap substring heuristic over the start of the raw body. It never
//! parses the document and never fails.

use std::fmt;

/// Number of leading characters inspected
pub const VERSION_SNIFF_CHARS: usize = 500;

/// Markup version label of a fetched document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupVersion {
    Html5,
    Html401,
    Xhtml10,
    Xhtml11,
    Unknown,
}

impl MarkupVersion {
    /// The label stored on the resource record
    pub fn label(&self) -> &'static str {
        match self {
            Self::Html5 => "HTML5",
            Self::Html401 => "HTML 4.01",
            Self::Xhtml10 => "XHTML 1.0",
            Self::Xhtml11 => "XHTML 1.1",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MarkupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detects the markup version from the first characters of a raw body
///
/// Checks are case-insensitive and applied in order: the HTML5 doctype,
/// then the "html 4.01", "xhtml 1.0" and "xhtml 1.1" version strings.
///
/// # Examples
///
/// ```
/// use siteprobe::crawler::{detect_markup_version, MarkupVersion};
///
/// assert_eq!(detect_markup_version("<!DOCTYPE html><html></html>"), MarkupVersion::Html5);
/// assert_eq!(detect_markup_version("<html></html>"), MarkupVersion::Unknown);
/// ```
pub fn detect_markup_version(raw: &str) -> MarkupVersion {
    let head: String = raw.chars().take(VERSION_SNIFF_CHARS).collect();
    let head = head.to_lowercase();

    if head.contains("<!doctype html>") {
        MarkupVersion::Html5
    } else if head.contains("html 4.01") {
        MarkupVersion::Html401
    } else if head.contains("xhtml 1.0") {
        MarkupVersion::Xhtml10
    } else if head.contains("xhtml 1.1") {
        MarkupVersion::Xhtml11
    } else {
        MarkupVersion::Unknown
    }
}
