//! Page storage
//!
//! Fetched pages (and every redirect hop that led to them) are persisted
//! keyed by the SHA-1 digest of the requested URL, so a URL maps to the same
//! record no matter which node fetched it. The crawl worker consults
//! [`PageStore::exists`] before fetching to avoid re-downloading known
//! pages.

mod memory;
mod sqlite;

pub use memory::MemoryPageStore;
pub use sqlite::SqlitePageStore;

use crate::fetch::{FetchedPage, RedirectHop};
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt record for {0}")]
    CorruptRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One stored page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// The URL as requested
    pub url: String,

    /// The URL that answered, after redirects
    pub final_url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type of the response
    pub content_type: String,

    /// Response body (empty for redirect hops)
    pub body: String,

    /// Where this URL redirected, when it did
    pub redirect_to: Option<String>,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

impl PageRecord {
    /// Record for a fully downloaded page.
    pub fn from_fetch(page: &FetchedPage) -> Self {
        Self {
            url: page.url.to_string(),
            final_url: page.final_url.to_string(),
            status_code: page.status,
            content_type: page.content_type.clone(),
            body: page.body.clone(),
            redirect_to: None,
            fetched_at: page.fetched_at,
        }
    }

    /// Record for one intermediate redirect hop.
    pub fn from_redirect(hop: &RedirectHop, fetched_at: DateTime<Utc>) -> Self {
        Self {
            url: hop.url.to_string(),
            final_url: hop.location.to_string(),
            status_code: hop.status,
            content_type: String::new(),
            body: String::new(),
            redirect_to: Some(hop.location.to_string()),
            fetched_at,
        }
    }
}

/// Storage backend for fetched pages.
///
/// Implementations are used from async workers through a mutex, so calls
/// should stay short; anything network-backed belongs behind its own
/// buffering.
pub trait PageStore {
    /// Whether a page for this URL is already stored.
    fn exists(&self, url: &Url) -> StoreResult<bool>;

    /// Inserts or replaces the record for its URL.
    fn save(&mut self, page: &PageRecord) -> StoreResult<()>;

    /// Fetches the record for a URL, if present.
    fn get(&self, url: &Url) -> StoreResult<Option<PageRecord>>;
}
