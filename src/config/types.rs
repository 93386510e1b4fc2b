use serde::Deserialize;
use std::time::Duration;

/// Configuration for a crawl node process
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    pub crawl: CrawlConfig,
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub store: StoreConfig,
}

/// Scheduling behavior of the node's crawl queue and worker
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Minimum time between fetches to the same site (milliseconds)
    #[serde(rename = "courtesy-delay-ms")]
    pub courtesy_delay_ms: u64,

    /// How long a crawled URL stays in the recency cache (seconds)
    #[serde(rename = "recency-ttl-secs")]
    pub recency_ttl_secs: u64,

    /// Capacity of the outbound (node -> exchange) URL channel
    #[serde(rename = "outbound-capacity")]
    pub outbound_capacity: usize,

    /// How long the worker sleeps when the queue is empty (milliseconds)
    #[serde(rename = "pop-backoff-ms")]
    pub pop_backoff_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            courtesy_delay_ms: 5000,
            recency_ttl_secs: 600,
            outbound_capacity: 20,
            pop_backoff_ms: 1000,
        }
    }
}

impl CrawlConfig {
    pub fn courtesy(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    pub fn recency_ttl(&self) -> Duration {
        Duration::from_secs(self.recency_ttl_secs)
    }

    pub fn pop_backoff(&self) -> Duration {
        Duration::from_millis(self.pop_backoff_ms)
    }
}

/// HTTP fetch limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Overall request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Redirect hops followed before giving up
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// User agent identification
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "weft".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
            contact_email: String::new(),
        }
    }
}

impl UserAgentConfig {
    /// Full User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() && self.contact_email.is_empty() {
            return format!("{}/{}", self.crawler_name, self.crawler_version);
        }
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Page store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "./weft.db".to_string(),
        }
    }
}

/// Configuration for an exchange process
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Virtual nodes per crawler token on the ring
    pub vnodes: usize,

    /// Pause before re-queueing an undeliverable URL (milliseconds)
    #[serde(rename = "retry-pause-ms")]
    pub retry_pause_ms: u64,

    /// Grace period for connections to wind down at shutdown (seconds)
    #[serde(rename = "shutdown-grace-secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            vnodes: 20,
            retry_pause_ms: 100,
            shutdown_grace_secs: 5,
        }
    }
}

impl ExchangeConfig {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
