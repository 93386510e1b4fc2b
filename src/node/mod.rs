//! Crawl node: the worker process of the fleet
//!
//! A node joins the exchange over TCP, schedules the URLs assigned to it
//! through its [`CrawlQueue`], crawls them one at a time per site, and
//! submits every discovered link back to the exchange for routing. On stop
//! the queue is closed and its remaining URLs are flushed back through the
//! outbound channel so no assigned work is lost.

mod session;
mod worker;

pub use session::run_session;
pub use worker::CrawlWorker;

use crate::config::NodeConfig;
use crate::fetch::Downloader;
use crate::queue::CrawlQueue;
use crate::robots::RobotsPolicy;
use crate::store::PageStore;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// One crawl node process.
pub struct Node {
    id: String,
    exchange_addr: String,
    config: NodeConfig,
    queue: Arc<CrawlQueue>,
}

impl Node {
    /// Creates a node that will join the exchange at `exchange_addr`
    /// (`host:port`).
    pub fn new(id: impl Into<String>, exchange_addr: impl Into<String>, config: NodeConfig) -> Self {
        let queue = Arc::new(CrawlQueue::with_cache_ttl(
            config.crawl.courtesy(),
            config.crawl.recency_ttl(),
        ));
        Self {
            id: id.into(),
            exchange_addr: exchange_addr.into(),
            config,
            queue,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn queue(&self) -> &Arc<CrawlQueue> {
        &self.queue
    }

    /// Runs the node until `shutdown` flips to true, then drains.
    pub async fn run<S: PageStore + Send + 'static>(
        self,
        store: S,
        shutdown: watch::Receiver<bool>,
    ) -> crate::Result<()> {
        tracing::info!(id = %self.id, exchange = %self.exchange_addr, "starting crawl node");

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.crawl.outbound_capacity);

        let downloader = Arc::new(Downloader::new(
            &self.config.fetch,
            &self.config.user_agent.header_value(),
        )?);
        let robots = Arc::new(RobotsPolicy::new(
            downloader.client().clone(),
            self.config.user_agent.crawler_name.clone(),
        ));
        let store = Arc::new(Mutex::new(store));

        let worker = CrawlWorker::new(
            Arc::clone(&self.queue),
            store,
            robots,
            downloader,
            outbound_tx.clone(),
            self.config.crawl.pop_backoff(),
        );
        let worker_task = tokio::spawn(worker.run(shutdown.clone()));

        let session_task = tokio::spawn(run_session(
            self.exchange_addr.clone(),
            Arc::clone(&self.queue),
            outbound_rx,
            outbound_tx.clone(),
            shutdown.clone(),
        ));

        let mut stop = shutdown.clone();
        while !*stop.borrow() {
            if stop.changed().await.is_err() {
                break;
            }
        }

        // Stop producing, then hand unfetched work back to the exchange; the
        // session's post-QUIT drain writes these out before the socket closes.
        self.queue.close();
        let leftovers = self.queue.flush();
        if !leftovers.is_empty() {
            tracing::info!(count = leftovers.len(), "returning unfetched URLs to the exchange");
            for url in leftovers {
                if outbound_tx.send(url).await.is_err() {
                    break;
                }
            }
        }
        drop(outbound_tx);

        let _ = worker_task.await;
        let _ = session_task.await;

        tracing::info!(id = %self.id, "crawl node stopped");
        Ok(())
    }
}
