//! Exchange session: one node's connection to the coordinator
//!
//! The session connects to the exchange, pushes assignment lines into the
//! node's crawl queue, and writes discovered URLs back out. A lost
//! connection is never fatal: the session rejoins with a fixed backoff until
//! an external stop is requested, at which point it sends `QUIT` and drains
//! the outbound channel before closing the socket.

use crate::queue::CrawlQueue;
use crate::site::parse_submission;
use crate::{QueueError, UrlError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use url::Url;

/// Fixed pause between failed attempts to rejoin the exchange.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Idle window while draining the outbound channel after `QUIT`.
const QUIT_DRAIN_IDLE: Duration = Duration::from_secs(1);

/// Runs the exchange session until `shutdown` flips to true.
///
/// `outbound_rx` carries URLs discovered by the crawl worker;
/// `outbound_tx` is the matching sender, used to put a URL back when a
/// write fails mid-flight so it survives the reconnect.
pub async fn run_session(
    exchange_addr: String,
    queue: Arc<CrawlQueue>,
    mut outbound_rx: mpsc::Receiver<Url>,
    outbound_tx: mpsc::Sender<Url>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match TcpStream::connect(&exchange_addr).await {
            Ok(stream) => {
                tracing::info!(exchange = %exchange_addr, "joined exchange");
                let stopped = run_connection(
                    stream,
                    &queue,
                    &mut outbound_rx,
                    &outbound_tx,
                    &mut shutdown,
                )
                .await;
                if stopped {
                    break;
                }
                tracing::warn!(exchange = %exchange_addr, "connection with exchange is down");
            }
            Err(e) => {
                tracing::warn!(exchange = %exchange_addr, error = %e, "failed to join exchange");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_BACKOFF) => {
                tracing::info!(exchange = %exchange_addr, "rejoining exchange");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("exchange session stopped");
}

/// Serves one live connection. Returns true when the session should end
/// (external stop), false when the connection was lost and a rejoin is due.
async fn run_connection(
    stream: TcpStream,
    queue: &CrawlQueue,
    outbound_rx: &mut mpsc::Receiver<Url>,
    outbound_tx: &mpsc::Sender<Url>,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut outbound_open = true;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    quit_and_drain(&mut write_half, outbound_rx).await;
                    return true;
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => push_assignment(&line, queue),
                    Ok(None) => {
                        tracing::info!("connection closed by exchange");
                        return false;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "read from exchange failed");
                        return false;
                    }
                }
            }
            maybe_url = outbound_rx.recv(), if outbound_open => {
                match maybe_url {
                    Some(url) => {
                        if let Err(e) = write_line(&mut write_half, url.as_str()).await {
                            tracing::warn!(url = %url, error = %e, "write to exchange failed");
                            // keep the URL for delivery after the rejoin
                            let _ = outbound_tx.try_send(url);
                            return false;
                        }
                    }
                    None => outbound_open = false,
                }
            }
        }
    }
}

/// Parses one assignment line and schedules it. Bad lines and late
/// assignments (queue already closed) are logged and dropped.
fn push_assignment(line: &str, queue: &CrawlQueue) {
    match parse_submission(line) {
        Ok(url) => match queue.push(&url) {
            Ok(()) => tracing::debug!(url = %url, "scheduled assigned URL"),
            Err(QueueError::Closed) => {
                tracing::debug!(url = %url, "queue closed, dropping assignment");
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "failed to schedule URL"),
        },
        Err(UrlError::Empty) => {}
        Err(e) => {
            tracing::warn!(line = %line.trim(), error = %e, "invalid assignment from exchange");
        }
    }
}

/// Announces departure and flushes whatever the worker still discovered.
/// The drain stops once the channel stays idle for [`QUIT_DRAIN_IDLE`].
async fn quit_and_drain(write_half: &mut OwnedWriteHalf, outbound_rx: &mut mpsc::Receiver<Url>) {
    match write_line(write_half, "QUIT").await {
        Ok(()) => tracing::info!("sent quit message to exchange"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to send quit message");
            return;
        }
    }

    loop {
        match timeout(QUIT_DRAIN_IDLE, outbound_rx.recv()).await {
            Ok(Some(url)) => {
                if let Err(e) = write_line(write_half, url.as_str()).await {
                    tracing::warn!(url = %url, error = %e, "write failed during drain");
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => break, // outbound stayed quiet, drain complete
        }
    }
}

async fn write_line(write_half: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    write_half.write_all(line.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_session_round_trip_and_quit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let queue = Arc::new(CrawlQueue::new(Duration::from_millis(10)));
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);

        let session = tokio::spawn(run_session(
            addr,
            Arc::clone(&queue),
            outbound_rx,
            outbound_tx.clone(),
            stop_rx,
        ));

        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // assignment flows into the queue
        write_half
            .write_all(b"http://example.com/assigned\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let queued = queue.flush();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].as_str(), "http://example.com/assigned");

        // discovered URL flows back out on the socket
        outbound_tx
            .send(Url::parse("http://found.test/").unwrap())
            .await
            .unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "http://found.test/"
        );

        // stop: QUIT goes out and the session ends
        stop_tx.send(true).unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "QUIT");
        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_assignment_does_not_kill_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let queue = Arc::new(CrawlQueue::new(Duration::from_millis(10)));
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);

        let session = tokio::spawn(run_session(
            addr,
            Arc::clone(&queue),
            outbound_rx,
            outbound_tx,
            stop_rx,
        ));

        let (stream, _) = listener.accept().await.unwrap();
        let (_read_half, mut write_half) = stream.into_split();

        write_half.write_all(b"not a url at all\n").await.unwrap();
        write_half.write_all(b"ftp://example.com/x\n").await.unwrap();
        write_half.write_all(b"\n").await.unwrap();
        write_half
            .write_all(b"http://example.com/good\n")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let queued = queue.flush();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].as_str(), "http://example.com/good");

        stop_tx.send(true).unwrap();
        session.await.unwrap();
    }
}
