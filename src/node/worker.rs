//! Crawl worker: turns scheduled URLs into stored pages and new discoveries
//!
//! The worker is the queue's only consumer on a node. For every popped URL
//! it skips already-stored pages, honors the robots policy, downloads the
//! page, sends extracted links to the exchange via the outbound channel,
//! and persists the page plus its redirect hops. Per-URL failures are
//! absorbed and logged; only a closed outbound channel ends the loop early.

use crate::extract::extract_links;
use crate::fetch::Downloader;
use crate::queue::CrawlQueue;
use crate::robots::RobotsPolicy;
use crate::store::{PageRecord, PageStore};
use crate::QueueError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use url::Url;

pub struct CrawlWorker<S: PageStore> {
    queue: Arc<CrawlQueue>,
    store: Arc<Mutex<S>>,
    robots: Arc<RobotsPolicy>,
    downloader: Arc<Downloader>,
    outbound: mpsc::Sender<Url>,
    pop_backoff: Duration,
}

impl<S: PageStore + Send + 'static> CrawlWorker<S> {
    pub fn new(
        queue: Arc<CrawlQueue>,
        store: Arc<Mutex<S>>,
        robots: Arc<RobotsPolicy>,
        downloader: Arc<Downloader>,
        outbound: mpsc::Sender<Url>,
        pop_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            robots,
            downloader,
            outbound,
            pop_backoff,
        }
    }

    /// Pops and processes URLs until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.queue.pop().await {
                Ok(url) => {
                    if let Err(e) = self.process(&url).await {
                        tracing::warn!(url = %url, error = %e, "failed to process URL");
                    }
                }
                Err(QueueError::Empty) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.pop_backoff) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "queue error, stopping worker");
                    break;
                }
            }
        }

        tracing::info!("crawl worker stopped");
    }

    /// Crawls one URL end to end.
    async fn process(&self, url: &Url) -> crate::Result<()> {
        {
            let store = self.store.lock().unwrap();
            if store.exists(url)? {
                tracing::debug!(url = %url, "already stored, skipping");
                return Ok(());
            }
        }

        if !self.robots.is_allowed(url).await {
            tracing::info!(url = %url, "denied by robots.txt, skipping");
            return Ok(());
        }

        let page = match self.downloader.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "download failed");
                return Ok(());
            }
        };

        tracing::info!(url = %url, status = page.status, "fetched page");

        for link in extract_links(&page.body, &page.final_url) {
            if self.outbound.send(link).await.is_err() {
                tracing::warn!("outbound channel closed, discarding discovered links");
                break;
            }
        }

        let fetched_at = page.fetched_at;
        let mut store = self.store.lock().unwrap();
        store.save(&PageRecord::from_fetch(&page))?;
        for hop in &page.redirect_chain {
            store.save(&PageRecord::from_redirect(hop, fetched_at))?;
        }

        Ok(())
    }
}
