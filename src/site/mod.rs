//! Site keys and URL handling
//!
//! A *site key* is the `scheme://host[:port]` portion of a URL. It is the
//! unit of ownership on the exchange ring and the unit of courtesy scheduling
//! on the nodes: two URLs with the same site key are always crawled by the
//! same node, spaced apart by the courtesy delay.

use crate::{UrlError, UrlResult};
use sha1::{Digest, Sha1};
use url::Url;

/// Derives the site key for a URL.
///
/// The key keeps an explicit port when the URL carries one, so services on
/// different ports of the same host count as distinct sites.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use weft::site::site_key;
///
/// let url = Url::parse("https://example.com/a/b?q=1").unwrap();
/// assert_eq!(site_key(&url), "https://example.com");
///
/// let url = Url::parse("http://example.com:8080/a").unwrap();
/// assert_eq!(site_key(&url), "http://example.com:8080");
/// ```
pub fn site_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Parses and validates one submitted URL line.
///
/// Accepts absolute `http`/`https` URLs with a host. Empty lines, relative
/// references, and other schemes are rejected; callers log and drop the line
/// without affecting the connection it arrived on.
pub fn parse_submission(line: &str) -> UrlResult<Url> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url = Url::parse(trimmed).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Hex-encoded SHA-1 digest of a URL string.
///
/// Used as the recency-cache key on nodes and as the page-store key, so the
/// same URL always maps to the same record regardless of which node saw it.
pub fn url_digest(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
