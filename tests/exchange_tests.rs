//! Integration tests for the exchange
//!
//! These tests run a real exchange on an ephemeral port and drive it with
//! raw TCP clients playing crawl nodes, covering routing, malformed input,
//! deregistration, and re-delivery after an owner disconnects.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use weft::config::ExchangeConfig;
use weft::exchange::{Exchange, ExchangeId};

/// Time to allow for connection registration to settle.
const SETTLE: Duration = Duration::from_millis(300);

/// Starts an exchange on an ephemeral port.
async fn start_exchange() -> (String, watch::Sender<bool>, JoinHandle<weft::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let config = ExchangeConfig {
        retry_pause_ms: 10,
        shutdown_grace_secs: 1,
        ..Default::default()
    };
    let exchange = Exchange::with_config(ExchangeId::new("ex-itest"), config);

    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(exchange.run(listener, stop_rx));
    (addr, stop_tx, handle)
}

/// A raw TCP client standing in for a crawl node.
struct TestNode {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write_half: OwnedWriteHalf,
}

impl TestNode {
    async fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            write_half,
        }
    }

    async fn submit(&mut self, line: &str) {
        self.write_half.write_all(line.as_bytes()).await.unwrap();
        self.write_half.write_all(b"\n").await.unwrap();
        self.write_half.flush().await.unwrap();
    }

    /// Reads one assignment line, or None if nothing arrives in `wait`.
    async fn try_read(&mut self, wait: Duration) -> Option<String> {
        match timeout(wait, self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            _ => None,
        }
    }
}

#[tokio::test]
async fn test_url_delivered_to_exactly_one_owner() {
    let (addr, stop_tx, handle) = start_exchange().await;

    let mut node1 = TestNode::connect(&addr).await;
    let mut node2 = TestNode::connect(&addr).await;
    tokio::time::sleep(SETTLE).await;

    node1.submit("http://a.test/").await;

    let got1 = node1.try_read(Duration::from_secs(2)).await;
    let got2 = node2.try_read(Duration::from_millis(500)).await;

    // one node owns http://a.test and receives the assignment
    let owner_is_node1 = match (&got1, &got2) {
        (Some(line), None) => {
            assert_eq!(line, "http://a.test/");
            true
        }
        (None, Some(line)) => {
            assert_eq!(line, "http://a.test/");
            false
        }
        other => panic!("expected exactly one delivery, got {:?}", other),
    };

    // ownership is deterministic regardless of the submitter
    node2.submit("http://a.test/").await;
    let (again1, again2) = if owner_is_node1 {
        (
            node1.try_read(Duration::from_secs(2)).await,
            node2.try_read(Duration::from_millis(200)).await,
        )
    } else {
        (
            node1.try_read(Duration::from_millis(200)).await,
            node2.try_read(Duration::from_secs(2)).await,
        )
    };

    if owner_is_node1 {
        assert_eq!(again1.as_deref(), Some("http://a.test/"));
        assert_eq!(again2, None);
    } else {
        assert_eq!(again2.as_deref(), Some("http://a.test/"));
        assert_eq!(again1, None);
    }

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_delivery_moves_to_survivor_after_disconnect() {
    let (addr, stop_tx, handle) = start_exchange().await;

    let mut node1 = TestNode::connect(&addr).await;
    let mut node2 = TestNode::connect(&addr).await;
    tokio::time::sleep(SETTLE).await;

    node1.submit("http://a.test/").await;

    let got1 = node1.try_read(Duration::from_secs(2)).await;
    let owner_is_node1 = got1.is_some();
    if !owner_is_node1 {
        assert_eq!(
            node2.try_read(Duration::from_secs(2)).await.as_deref(),
            Some("http://a.test/")
        );
    }

    // drop the owner; the ring rebalances onto the survivor
    let mut survivor = if owner_is_node1 {
        drop(node1);
        node2
    } else {
        drop(node2);
        node1
    };
    tokio::time::sleep(SETTLE).await;

    survivor.submit("http://a.test/").await;
    assert_eq!(
        survivor.try_read(Duration::from_secs(2)).await.as_deref(),
        Some("http://a.test/")
    );

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_lines_do_not_kill_the_connection() {
    let (addr, stop_tx, handle) = start_exchange().await;

    let mut node = TestNode::connect(&addr).await;
    tokio::time::sleep(SETTLE).await;

    node.submit("definitely not a url").await;
    node.submit("ftp://wrong.scheme/file").await;
    node.submit("").await;
    node.submit("http://good.test/page").await;

    // the sole node owns everything, so the one valid URL comes back
    assert_eq!(
        node.try_read(Duration::from_secs(2)).await.as_deref(),
        Some("http://good.test/page")
    );

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_quit_deregisters_without_killing_others() {
    let (addr, stop_tx, handle) = start_exchange().await;

    let mut node1 = TestNode::connect(&addr).await;
    let mut node2 = TestNode::connect(&addr).await;
    tokio::time::sleep(SETTLE).await;

    node2.submit("QUIT").await;
    tokio::time::sleep(SETTLE).await;

    // node1 is the only member left; everything routes to it
    node1.submit("http://a.test/").await;
    node1.submit("http://b.test/").await;

    let mut received = vec![
        node1.try_read(Duration::from_secs(2)).await.unwrap(),
        node1.try_read(Duration::from_secs(2)).await.unwrap(),
    ];
    received.sort();
    assert_eq!(received, vec!["http://a.test/", "http://b.test/"]);

    stop_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_clean_shutdown_with_connected_nodes() {
    let (addr, stop_tx, handle) = start_exchange().await;

    let _node1 = TestNode::connect(&addr).await;
    let _node2 = TestNode::connect(&addr).await;
    tokio::time::sleep(SETTLE).await;

    stop_tx.send(true).unwrap();
    let result = timeout(Duration::from_secs(5), handle).await;
    result.expect("shutdown timed out").unwrap().unwrap();
}
