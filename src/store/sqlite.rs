//! SQLite page store

use crate::site::url_digest;
use crate::store::{PageRecord, PageStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use url::Url;

/// SQLite storage backend for fetched pages.
pub struct SqlitePageStore {
    conn: Connection,
}

impl SqlitePageStore {
    /// Opens (or creates) the database at `path`.
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Number of stored pages.
    pub fn count(&self) -> StoreResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            url_hash     TEXT PRIMARY KEY,
            url          TEXT NOT NULL,
            final_url    TEXT NOT NULL,
            status_code  INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            body         TEXT NOT NULL,
            redirect_to  TEXT,
            fetched_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pages_final_url ON pages(final_url);
    ",
    )
}

impl PageStore for SqlitePageStore {
    fn exists(&self, url: &Url) -> StoreResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM pages WHERE url_hash = ?1",
                params![url_digest(url.as_str())],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save(&mut self, page: &PageRecord) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pages
             (url_hash, url, final_url, status_code, content_type, body, redirect_to, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                url_digest(&page.url),
                page.url,
                page.final_url,
                page.status_code,
                page.content_type,
                page.body,
                page.redirect_to,
                page.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, url: &Url) -> StoreResult<Option<PageRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT url, final_url, status_code, content_type, body, redirect_to, fetched_at
                 FROM pages WHERE url_hash = ?1",
                params![url_digest(url.as_str())],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        match record {
            None => Ok(None),
            Some((url, final_url, status_code, content_type, body, redirect_to, fetched_at)) => {
                let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                    .map_err(|_| StoreError::CorruptRecord(url.clone()))?
                    .with_timezone(&Utc);
                Ok(Some(PageRecord {
                    url,
                    final_url,
                    status_code,
                    content_type,
                    body,
                    redirect_to,
                    fetched_at,
                }))
            }
        }
    }
}
