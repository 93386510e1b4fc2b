//! Exchange coordinator: accept loop and the URL distribution path
//!
//! Every accepted connection gets its own reader task that validates
//! submitted lines and feeds them into one shared submission stream. A
//! single distribution task drains that stream, asks the router for the
//! owning connection, and writes the URL line there. Shutdown closes the
//! listener first, lets the readers wind down, then drains the stream to
//! completion before returning.

use crate::config::ExchangeConfig;
use crate::exchange::{CrawlerHandle, ExchangeId, Router};
use crate::site::parse_submission;
use crate::UrlError;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::timeout;
use url::Url;
use uuid::Uuid;

/// Passes over the retry backlog once the submission stream has closed.
const DRAIN_PASSES: usize = 3;

/// The network-facing coordinator for one exchange process.
pub struct Exchange {
    id: ExchangeId,
    router: Arc<Router>,
    config: ExchangeConfig,
}

impl Exchange {
    /// Creates an exchange with default configuration.
    pub fn new(id: ExchangeId) -> Self {
        Self::with_config(id, ExchangeConfig::default())
    }

    pub fn with_config(id: ExchangeId, config: ExchangeConfig) -> Self {
        Self {
            router: Arc::new(Router::new(config.vnodes)),
            id,
            config,
        }
    }

    pub fn id(&self) -> &ExchangeId {
        &self.id
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Serves the exchange until `shutdown` flips to true.
    ///
    /// Accepts connections on `listener`, one reader task each. On shutdown
    /// the listener closes first, reader tasks are given a grace period to
    /// acknowledge before being aborted, and the distribution task drains
    /// the remaining submission stream before this returns.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> crate::Result<()> {
        let (tx, rx) = mpsc::unbounded_channel::<Url>();

        let distributor = tokio::spawn(distribute(
            self.id.clone(),
            Arc::clone(&self.router),
            rx,
            self.config.retry_pause(),
        ));

        let mut readers = JoinSet::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::info!(peer = %addr, "accepted crawler connection");
                            readers.spawn(handle_connection(
                                self.id.clone(),
                                Arc::clone(&self.router),
                                stream,
                                addr,
                                tx.clone(),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed, stopping listener");
                            break;
                        }
                    }
                }
                Some(_) = readers.join_next(), if !readers.is_empty() => {}
            }
        }

        // Close the listening socket before draining; the readers' senders
        // keep the stream open until each connection winds down.
        drop(listener);
        drop(tx);
        tracing::info!("draining submission stream");

        let grace = self.config.shutdown_grace();
        let drained = timeout(grace, async {
            while readers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!("grace period elapsed, force-closing remaining connections");
            readers.shutdown().await;
        }

        if let Err(e) = distributor.await {
            tracing::error!(error = %e, "distribution task failed");
        }

        tracing::info!("exchange stopped");
        Ok(())
    }
}

/// Reads URL submissions off one node connection for as long as it lives.
///
/// The connection registers with the router on entry and deregisters on any
/// exit path: EOF, read error, a `QUIT` line, or coordinator shutdown.
/// Malformed lines are logged and dropped without affecting the connection.
async fn handle_connection(
    exchange_id: ExchangeId,
    router: Arc<Router>,
    stream: TcpStream,
    addr: SocketAddr,
    submissions: mpsc::UnboundedSender<Url>,
    mut shutdown: watch::Receiver<bool>,
) {
    let (read_half, write_half) = stream.into_split();
    let token = Uuid::new_v4().to_string();
    router.add(Arc::new(CrawlerHandle::new(
        token.clone(),
        exchange_id,
        write_half,
    )));

    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim() == "QUIT" {
                            tracing::info!(peer = %addr, token = %token, "crawler requested deregistration");
                            break;
                        }
                        match parse_submission(&line) {
                            Ok(url) => {
                                // receiver only closes after every reader is gone
                                let _ = submissions.send(url);
                            }
                            Err(UrlError::Empty) => {
                                tracing::debug!(peer = %addr, "skipping empty line");
                            }
                            Err(e) => {
                                tracing::warn!(peer = %addr, line = %line.trim(), error = %e, "invalid URL submission");
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::info!(peer = %addr, "connection closed by crawler");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(peer = %addr, error = %e, "connection read failed");
                        break;
                    }
                }
            }
        }
    }

    router.remove(&token);
}

/// Drains the shared submission stream, routing each URL to its owner.
///
/// Undeliverable URLs (no ring members yet, owner mid-deregistration, write
/// failure) go to the back of a retry backlog behind a short pause instead
/// of being dropped. After the stream closes the backlog gets a bounded
/// number of passes; whatever still cannot be delivered is logged and
/// dropped.
async fn distribute(
    id: ExchangeId,
    router: Arc<Router>,
    mut rx: mpsc::UnboundedReceiver<Url>,
    retry_pause: std::time::Duration,
) {
    let mut pending: VecDeque<Url> = VecDeque::new();

    loop {
        let url = match rx.try_recv() {
            Ok(url) => url,
            Err(mpsc::error::TryRecvError::Empty) => match pending.pop_front() {
                Some(url) => url,
                None => match rx.recv().await {
                    Some(url) => url,
                    None => break,
                },
            },
            Err(mpsc::error::TryRecvError::Disconnected) => match pending.pop_front() {
                Some(url) => url,
                None => break,
            },
        };

        if let Err(url) = dispatch(&id, &router, url).await {
            tokio::time::sleep(retry_pause).await;
            pending.push_back(url);
        }
    }

    for _ in 0..DRAIN_PASSES {
        if pending.is_empty() {
            break;
        }
        let mut still_pending = VecDeque::new();
        for url in pending.drain(..) {
            if let Err(url) = dispatch(&id, &router, url).await {
                still_pending.push_back(url);
            }
        }
        pending = still_pending;
        if !pending.is_empty() {
            tokio::time::sleep(retry_pause).await;
        }
    }

    if !pending.is_empty() {
        tracing::warn!(
            dropped = pending.len(),
            "undeliverable URLs remained at shutdown"
        );
    }
}

/// Routes one URL and writes it to the owning connection.
///
/// Returns the URL back to the caller when it should be retried.
async fn dispatch(id: &ExchangeId, router: &Router, url: Url) -> Result<(), Url> {
    let handle = match router.route(&url) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "routing unavailable, re-queueing");
            return Err(url);
        }
    };

    if handle.exchange_id() != id {
        forward_remote(&url, handle.exchange_id());
        return Ok(());
    }

    match handle.send_line(url.as_str()).await {
        Ok(()) => {
            tracing::debug!(url = %url, token = %handle.token(), "assigned URL");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(url = %url, token = %handle.token(), error = %e, "write to crawler failed, re-queueing");
            Err(url)
        }
    }
}

/// Hand-off point for URLs owned by a different exchange instance.
///
/// A message-bus publish slots in here without touching the routing logic;
/// until then the URL is surfaced in the log and dropped.
fn forward_remote(url: &Url, owner: &ExchangeId) {
    tracing::warn!(url = %url, owner = %owner, "no inter-exchange transport configured, dropping");
}
