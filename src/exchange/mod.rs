//! URL exchange: the network-facing fleet coordinator
//!
//! The exchange accepts one TCP connection per crawl node, reads URL
//! submissions off every connection, and routes each URL to the node that
//! owns the URL's site according to the consistent-hashing ring. Ownership
//! follows connections: a node joining or leaving re-registers its token on
//! the ring, and only the adjacent slice of sites changes hands.

mod coordinator;
mod handle;
mod router;

pub use coordinator::Exchange;
pub use handle::{CrawlerHandle, ExchangeId};
pub use router::Router;
