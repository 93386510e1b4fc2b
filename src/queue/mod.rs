//! Per-node crawl scheduling
//!
//! This module handles:
//! - Courtesy spacing: successive fetches to the same site are separated by a
//!   configurable minimum gap
//! - Independent sites: URLs for unrelated sites release with no enforced gap
//! - Short-lived de-duplication of recently crawled URLs
//!
//! Internally each site keeps at most one *head* element in the release
//! order; the rest of that site's backlog hangs off the head as a FIFO chain
//! and is only scheduled when the head is popped.

use crate::site::{site_key, url_digest};
use crate::QueueError;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// How long a popped URL stays in the recency cache.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// The next-releasable URL for one site.
#[derive(Debug, Clone)]
struct HeadEntry {
    activates_at: Instant,
    seq: u64,
    site: String,
    url: Url,
}

// Reverse comparison so the earliest activation pops first from BinaryHeap;
// the sequence number makes ties deterministic in arrival order.
impl Ord for HeadEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .activates_at
            .cmp(&self.activates_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeadEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeadEntry {
    fn eq(&self, other: &Self) -> bool {
        self.activates_at == other.activates_at && self.seq == other.seq
    }
}

impl Eq for HeadEntry {}

#[derive(Debug, Default)]
struct QueueInner {
    /// Per-site heads ordered by activation time.
    scheduled: BinaryHeap<HeadEntry>,
    /// Backlog per site key, excluding the head. Presence of a key (even with
    /// an empty backlog) means that site currently has a scheduled head.
    chains: HashMap<String, VecDeque<Url>>,
    /// URL digest -> cache expiry.
    recent: HashMap<String, Instant>,
    closed: bool,
    next_seq: u64,
}

/// Courtesy-scheduled URL queue for one crawl node.
///
/// All state sits behind one mutex; the courtesy wait in [`pop`] happens
/// after the reserved element leaves the structure and the lock is released,
/// so a sleeping popper never blocks pushes or pops for other sites.
///
/// [`pop`]: CrawlQueue::pop
#[derive(Debug)]
pub struct CrawlQueue {
    inner: Mutex<QueueInner>,
    courtesy: Duration,
    cache_ttl: Duration,
}

impl CrawlQueue {
    /// Creates a queue enforcing `courtesy` between same-site releases.
    pub fn new(courtesy: Duration) -> Self {
        Self::with_cache_ttl(courtesy, DEFAULT_CACHE_TTL)
    }

    /// Creates a queue with an explicit recency-cache TTL.
    pub fn with_cache_ttl(courtesy: Duration, cache_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            courtesy,
            cache_ttl,
        }
    }

    /// Enqueues a URL.
    ///
    /// Returns [`QueueError::Closed`] after [`close`]. A URL still in the
    /// recency cache is silently dropped. If the URL's site already has a
    /// pending head, the URL joins that site's FIFO chain; otherwise it
    /// becomes a new head, releasable immediately.
    ///
    /// [`close`]: CrawlQueue::close
    pub fn push(&self, url: &Url) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.closed {
            return Err(QueueError::Closed);
        }

        if inner.recent.contains_key(&url_digest(url.as_str())) {
            tracing::trace!(url = %url, "dropping recently seen URL");
            return Ok(());
        }

        let site = site_key(url);
        match inner.chains.get_mut(&site) {
            Some(backlog) => {
                backlog.push_back(url.clone());
            }
            None => {
                inner.chains.insert(site.clone(), VecDeque::new());
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.scheduled.push(HeadEntry {
                    activates_at: Instant::now(),
                    seq,
                    site,
                    url: url.clone(),
                });
            }
        }

        Ok(())
    }

    /// Takes the next URL that is legal to fetch.
    ///
    /// Returns [`QueueError::Empty`] when nothing is scheduled. Otherwise the
    /// earliest-activating head is reserved, its successor (if any) is
    /// re-scheduled at `max(now, head activation) + courtesy`, and the call
    /// suspends until the reserved head's activation time before handing the
    /// URL back. An activation already in the past means no wait at all.
    pub async fn pop(&self) -> Result<Url, QueueError> {
        let (url, activates_at) = {
            let mut inner = self.inner.lock().unwrap();

            let head = match inner.scheduled.pop() {
                Some(head) => head,
                None => return Err(QueueError::Empty),
            };

            let now = Instant::now();
            let successor = inner
                .chains
                .get_mut(&head.site)
                .and_then(|backlog| backlog.pop_front());
            match successor {
                Some(next_url) => {
                    let activates_at = head.activates_at.max(now) + self.courtesy;
                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    inner.scheduled.push(HeadEntry {
                        activates_at,
                        seq,
                        site: head.site.clone(),
                        url: next_url,
                    });
                }
                None => {
                    inner.chains.remove(&head.site);
                }
            }

            let expiry = now + self.cache_ttl;
            inner.recent.insert(url_digest(head.url.as_str()), expiry);
            inner.recent.retain(|_, expires| *expires > now);

            (head.url, head.activates_at)
        };

        tokio::time::sleep_until(activates_at).await;
        Ok(url)
    }

    /// Snapshot of every queued URL: heads in activation order, each followed
    /// by its site's backlog in FIFO order. Used to drain on shutdown.
    pub fn flush(&self) -> Vec<Url> {
        let inner = self.inner.lock().unwrap();

        let mut heads: Vec<&HeadEntry> = inner.scheduled.iter().collect();
        heads.sort_by_key(|h| (h.activates_at, h.seq));

        let mut urls = Vec::new();
        for head in heads {
            urls.push(head.url.clone());
            if let Some(backlog) = inner.chains.get(&head.site) {
                urls.extend(backlog.iter().cloned());
            }
        }
        urls
    }

    /// Marks the queue closed. Pushes fail afterwards; already queued
    /// elements remain poppable and in-flight pops complete normally.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }

    /// Number of sites with a schedulable head.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
