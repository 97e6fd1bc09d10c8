//! HTTP fetcher implementation
//!
//! This module handles the outbound page fetch for a crawl task:
//! - Building the shared HTTP client from configuration
//! - GET requests for the tracked page, raced against task cancellation
//!
//! Any HTTP status is accepted for the page itself; only transport failures
//! are errors.

use crate::config::HttpConfig;
use crate::crawler::cancellable;
use crate::{ProbeError, ResourceId};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A fetched page body
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    /// HTTP status code of the final response
    pub status_code: u16,
    /// Decoded response body
    pub body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The outbound HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use siteprobe::config::HttpConfig;
/// use siteprobe::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page body, aborting as soon as `cancel` fires
///
/// # Returns
///
/// * `Ok(FetchedPage)` - A response was received and its body read
/// * `Err(ProbeError::Cancelled)` - The task was cancelled mid-request
/// * `Err(ProbeError::Http)` - Connection, timeout, redirect or body error
pub async fn fetch_page(
    client: &Client,
    url: &str,
    resource_id: ResourceId,
    cancel: &CancellationToken,
) -> Result<FetchedPage, ProbeError> {
    let http_error = |source: reqwest::Error| ProbeError::Http {
        url: url.to_string(),
        source,
    };

    let response = cancellable(cancel, resource_id, client.get(url).send())
        .await?
        .map_err(http_error)?;

    let status_code = response.status().as_u16();
    let final_url = response.url().to_string();

    let body = cancellable(cancel, resource_id, response.text())
        .await?
        .map_err(http_error)?;

    Ok(FetchedPage {
        final_url,
        status_code,
        body,
    })
}
