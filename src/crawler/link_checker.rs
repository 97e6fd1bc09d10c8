//! Link reachability checks
//!
//! Each extracted link is checked with HEAD first. A transport error or a
//! status of 400 and above is followed by a GET, whose outcome is final.
//! Links that do not resolve to an HTTP(S) address are never requested.

use crate::crawler::cancellable;
use crate::url::ResolvedLink;
use crate::{ProbeError, ResourceId};
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;

/// Outcome of checking one link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCheck {
    /// Status of the final response, 0 when none was received
    pub status_code: u16,
    /// True when no response was received or the status is 400 or above
    pub is_broken: bool,
}

impl LinkCheck {
    pub fn from_status(status_code: u16) -> Self {
        Self {
            status_code,
            is_broken: status_code >= 400,
        }
    }

    /// No response could be obtained
    pub fn unreachable() -> Self {
        Self {
            status_code: 0,
            is_broken: true,
        }
    }
}

/// Checks a resolved link
///
/// # Returns
///
/// * `Ok(LinkCheck)` - The check completed, successfully or not
/// * `Err(ProbeError::Cancelled)` - The owning task was cancelled
pub async fn check_link(
    client: &Client,
    link: &ResolvedLink,
    resource_id: ResourceId,
    cancel: &CancellationToken,
) -> Result<LinkCheck, ProbeError> {
    let url = match &link.url {
        Some(url) if matches!(url.scheme(), "http" | "https") => url.clone(),
        _ => return Ok(LinkCheck::unreachable()),
    };

    let head = cancellable(cancel, resource_id, client.head(url.clone()).send()).await?;
    if let Some(check) = usable(head) {
        return Ok(check);
    }

    let get = cancellable(cancel, resource_id, client.get(url).send()).await?;
    Ok(match get {
        Ok(response) => LinkCheck::from_status(response.status().as_u16()),
        Err(e) => {
            tracing::trace!("Link {} unreachable: {}", link.address, e);
            LinkCheck::unreachable()
        }
    })
}

/// A HEAD outcome that needs no GET fallback
fn usable(head: Result<Response, reqwest::Error>) -> Option<LinkCheck> {
    match head {
        Ok(response) if response.status().as_u16() < 400 => {
            Some(LinkCheck::from_status(response.status().as_u16()))
        }
        _ => None,
    }
}
