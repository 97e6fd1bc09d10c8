//! URL handling module for Siteprobe
//!
//! This module provides address normalization for newly tracked resources,
//! host extraction and comparison, and href resolution for extracted links.

mod domain;
mod normalize;
mod resolve;

// Re-export main functions
pub use domain::{extract_domain, same_host};
pub use normalize::normalize_url;
pub use resolve::{resolve_href, ResolvedLink};
