//! In-memory page store
//!
//! Ephemeral backend for tests and throwaway runs; same keying as the
//! SQLite store.

use crate::site::url_digest;
use crate::store::{PageRecord, PageStore, StoreResult};
use std::collections::HashMap;
use url::Url;

/// HashMap-backed page store.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: HashMap<String, PageRecord>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageStore for MemoryPageStore {
    fn exists(&self, url: &Url) -> StoreResult<bool> {
        Ok(self.pages.contains_key(&url_digest(url.as_str())))
    }

    fn save(&mut self, page: &PageRecord) -> StoreResult<()> {
        self.pages.insert(url_digest(&page.url), page.clone());
        Ok(())
    }

    fn get(&self, url: &Url) -> StoreResult<Option<PageRecord>> {
        Ok(self.pages.get(&url_digest(url.as_str())).cloned())
    }
}
