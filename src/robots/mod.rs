//! Robots.txt policy
//!
//! Fetches and caches one robots.txt per site key and answers allow/deny
//! questions for the crawl worker. A missing, unreadable, or non-200
//! robots.txt means the site is fully allowed; the policy is advisory and
//! must never block the crawl on its own failures.

use crate::site::site_key;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Cached robots.txt body for one site.
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(body: String) -> Self {
        Self {
            body,
            fetched_at: Utc::now(),
        }
    }

    /// Robots data older than a day is refetched on next use.
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Per-site robots.txt evaluation with a 24-hour cache.
pub struct RobotsPolicy {
    client: Client,
    agent: String,
    cache: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsPolicy {
    /// Creates a policy evaluating rules for `agent` (the crawler name as it
    /// appears in robots.txt user-agent groups, not the full header value).
    pub fn new(client: Client, agent: impl Into<String>) -> Self {
        Self {
            client,
            agent: agent.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `url` may be fetched according to its site's robots.txt.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let site = site_key(url);

        let cached = {
            let cache = self.cache.lock().unwrap();
            cache
                .get(&site)
                .filter(|entry| !entry.is_stale())
                .map(|entry| entry.body.clone())
        };

        let body = match cached {
            Some(body) => body,
            None => {
                let body = self.fetch_robots(&site).await;
                let mut cache = self.cache.lock().unwrap();
                cache.insert(site, CachedRobots::new(body.clone()));
                body
            }
        };

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&body, &self.agent, url.as_str())
    }

    async fn fetch_robots(&self, site: &str) -> String {
        let robots_url = format!("{}/robots.txt", site);
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(site = %site, "fetched robots.txt");
                response.text().await.unwrap_or_default()
            }
            Ok(response) => {
                tracing::debug!(site = %site, status = response.status().as_u16(), "no robots.txt, allowing all");
                String::new()
            }
            Err(e) => {
                tracing::debug!(site = %site, error = %e, "robots.txt fetch failed, allowing all");
                String::new()
            }
        }
    }
}
