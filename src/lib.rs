//! Weft: a distributed crawl fleet
//!
//! This crate implements a fleet of crawl workers ("nodes") coordinated by a
//! central URL exchange. The exchange owns a consistent-hashing ring so that
//! every site is crawled by exactly one node at a time; each node schedules
//! its assigned URLs through a courtesy queue that spaces out requests to the
//! same site and drops recently seen URLs.

pub mod config;
pub mod exchange;
pub mod extract;
pub mod fetch;
pub mod node;
pub mod queue;
pub mod ring;
pub mod robots;
pub mod site;
pub mod store;

use thiserror::Error;

/// Main error type for weft operations
#[derive(Debug, Error)]
pub enum WeftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Ring error: {0}")]
    Ring(#[from] RingError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Empty submission line")]
    Empty,
}

/// Consistent-hash ring errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    /// No token has been added to the ring yet.
    #[error("no node has been added to the ring")]
    EmptyRing,
}

/// Routing errors
///
/// Both variants mean the routing state is not (yet) consistent with the
/// connected fleet. Callers re-queue the URL and retry; neither is fatal.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Ring(#[from] RingError),

    #[error("crawler {token} is not registered")]
    CrawlerNotFound { token: String },
}

/// Crawl queue errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Nothing is scheduled right now; the caller should back off and retry.
    #[error("queue is empty")]
    Empty,

    /// The queue was closed; no further pushes are accepted.
    #[error("queue was closed")]
    Closed,
}

/// Download errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect loop detected at {url}")]
    RedirectLoop { url: String },

    #[error("Redirect from {url} carries no Location header")]
    MissingLocation { url: String },

    #[error("{url} is not an HTML page ({content_type})")]
    NotHtml { url: String, content_type: String },
}

/// Result type alias for weft operations
pub type Result<T> = std::result::Result<T, WeftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{ExchangeConfig, NodeConfig};
pub use exchange::{CrawlerHandle, Exchange, ExchangeId, Router};
pub use queue::CrawlQueue;
pub use ring::RingHasher;
pub use site::{parse_submission, site_key, url_digest};
