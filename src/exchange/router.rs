use crate::exchange::CrawlerHandle;
use crate::ring::RingHasher;
use crate::site::site_key;
use crate::RouteError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use url::Url;

struct Registry {
    crawlers: HashMap<String, Arc<CrawlerHandle>>,
    ring: RingHasher,
}

/// Routes URLs to the connected crawler that owns their site.
///
/// The handle map and the ring always change together under one exclusive
/// section, so a routing decision can never observe a token that is on the
/// ring but missing from the map or vice versa. Lookups take the shared
/// section and hold it only for the ring search plus one map access.
pub struct Router {
    registry: RwLock<Registry>,
}

impl Router {
    pub fn new(vnodes: usize) -> Self {
        Self {
            registry: RwLock::new(Registry {
                crawlers: HashMap::new(),
                ring: RingHasher::with_vnodes(vnodes),
            }),
        }
    }

    /// Registers a connection handle and its ring membership atomically.
    pub fn add(&self, handle: Arc<CrawlerHandle>) {
        let mut registry = self.registry.write().unwrap();
        let token = handle.token().to_string();
        registry.crawlers.insert(token.clone(), handle);
        registry.ring.add(&token);
        tracing::debug!(token = %token, crawlers = registry.crawlers.len(), "registered crawler");
    }

    /// Removes a token from both the map and the ring atomically. The handle
    /// must not be used for routing once this returns.
    pub fn remove(&self, token: &str) {
        let mut registry = self.registry.write().unwrap();
        registry.ring.remove(token);
        registry.crawlers.remove(token);
        tracing::debug!(token = %token, crawlers = registry.crawlers.len(), "deregistered crawler");
    }

    /// Resolves the connection that owns `url`'s site.
    ///
    /// `CrawlerNotFound` means the ring named a token whose handle is already
    /// gone, a transient state during deregistration; callers re-queue the
    /// URL rather than dropping it.
    pub fn route(&self, url: &Url) -> Result<Arc<CrawlerHandle>, RouteError> {
        let registry = self.registry.read().unwrap();
        let token = registry.ring.get(&site_key(url))?;
        registry
            .crawlers
            .get(token)
            .cloned()
            .ok_or_else(|| RouteError::CrawlerNotFound {
                token: token.to_string(),
            })
    }

    /// Number of registered crawlers.
    pub fn len(&self) -> usize {
        self.registry.read().unwrap().crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeId;
    use crate::RingError;

    fn test_handle(token: &str) -> Arc<CrawlerHandle> {
        let (client, server) = tokio::io::duplex(64);
        // keep the read side alive so writes do not error
        std::mem::forget(server);
        Arc::new(CrawlerHandle::new(token, ExchangeId::new("ex-test"), client))
    }

    #[tokio::test]
    async fn test_route_on_empty_router() {
        let router = Router::new(20);
        let url = Url::parse("http://example.com/").unwrap();
        assert!(matches!(
            router.route(&url),
            Err(RouteError::Ring(RingError::EmptyRing))
        ));
    }

    #[tokio::test]
    async fn test_route_single_crawler_owns_everything() {
        let router = Router::new(20);
        router.add(test_handle("only"));

        for i in 0..50 {
            let url = Url::parse(&format!("http://site{}.test/page", i)).unwrap();
            let handle = router.route(&url).unwrap();
            assert_eq!(handle.token(), "only");
        }
    }

    #[tokio::test]
    async fn test_route_is_deterministic_and_site_scoped() {
        let router = Router::new(20);
        router.add(test_handle("node-a"));
        router.add(test_handle("node-b"));
        router.add(test_handle("node-c"));

        let page1 = Url::parse("http://example.com/1").unwrap();
        let page2 = Url::parse("http://example.com/deeply/nested?q=2").unwrap();
        let owner = router.route(&page1).unwrap().token().to_string();

        // same site key, same owner, no matter the path
        for _ in 0..10 {
            assert_eq!(router.route(&page2).unwrap().token(), owner);
        }
    }

    #[tokio::test]
    async fn test_remove_reroutes_to_survivors() {
        let router = Router::new(20);
        router.add(test_handle("node-a"));
        router.add(test_handle("node-b"));

        let urls: Vec<Url> = (0..100)
            .map(|i| Url::parse(&format!("http://s{}.test/", i)).unwrap())
            .collect();

        let removed = router.route(&urls[0]).unwrap().token().to_string();
        router.remove(&removed);
        assert_eq!(router.len(), 1);

        for url in &urls {
            let handle = router.route(url).unwrap();
            assert_ne!(handle.token(), removed);
        }
    }
}
