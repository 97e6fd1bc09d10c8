use crate::url::domain::same_host;
use url::Url;

/// An anchor href resolved against the page it was found on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The address stored for the link
    pub address: String,

    /// The parsed absolute URL, absent when resolution fell back to a path-only address
    pub url: Option<Url>,

    /// True if the link points at the page's own host
    pub is_internal: bool,
}

/// Resolves an href relative to the page address and classifies it
///
/// Resolution never fails: an href the URL parser rejects is kept verbatim
/// as a path-only address. Such an address has no host, so it is always
/// classified as external.
///
/// # Examples
///
/// ```
/// use siteprobe::url::resolve_href;
/// use url::Url;
///
/// let page = Url::parse("http://a.example/page").unwrap();
/// let link = resolve_href(&page, "/x");
/// assert_eq!(link.address, "http://a.example/x");
/// assert!(link.is_internal);
/// ```
pub fn resolve_href(page_url: &Url, href: &str) -> ResolvedLink {
    match page_url.join(href) {
        Ok(resolved) => ResolvedLink {
            address: resolved.to_string(),
            is_internal: same_host(&resolved, page_url),
            url: Some(resolved),
        },
        Err(e) => {
            tracing::debug!("Falling back to path-only address for {:?}: {}", href, e);
            ResolvedLink {
                address: href.to_string(),
                url: None,
                is_internal: false,
            }
        }
    }
}
