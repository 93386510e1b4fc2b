//! HTTP downloader
//!
//! Wraps `reqwest` with the fleet's fetch policy:
//! - redirects disabled at the client and followed manually, at most
//!   `max-redirects` hops, with loop detection across the visited set
//! - bounded request and connect timeouts
//! - HTML-only enforcement via the Content-Type header
//!
//! Every redirect hop is reported back to the caller so intermediate URLs
//! can be persisted alongside the final page.

use crate::config::FetchConfig;
use crate::FetchError;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::collections::HashSet;
use url::Url;

/// One hop of a redirect chain.
#[derive(Debug, Clone)]
pub struct RedirectHop {
    pub url: Url,
    pub status: u16,
    pub location: Url,
}

/// A successfully downloaded page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL as requested
    pub url: Url,

    /// The URL that actually answered, after redirects
    pub final_url: Url,

    /// HTTP status code of the final response
    pub status: u16,

    /// Content-Type header value of the final response
    pub content_type: String,

    /// Response body
    pub body: String,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,

    /// Redirect hops traversed on the way to `final_url`
    pub redirect_chain: Vec<RedirectHop>,
}

/// HTTP fetcher for crawl workers.
pub struct Downloader {
    client: Client,
    max_redirects: usize,
}

impl Downloader {
    /// Builds a downloader from fetch limits and a User-Agent value.
    pub fn new(config: &FetchConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .redirect(Policy::none()) // handled manually below
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }

    /// Fetches a page, following redirects manually.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut visited: HashSet<Url> = HashSet::from([url.clone()]);
        let mut chain: Vec<RedirectHop> = Vec::new();
        let mut current = url.clone();

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| classify(&current, e))?;

            let status = response.status();

            if status.is_redirection() {
                if chain.len() >= self.max_redirects {
                    return Err(FetchError::RedirectLimit {
                        url: url.to_string(),
                    });
                }

                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::MissingLocation {
                        url: current.to_string(),
                    })?;

                let next = current.join(location).map_err(|_| FetchError::MissingLocation {
                    url: current.to_string(),
                })?;

                if !visited.insert(next.clone()) {
                    return Err(FetchError::RedirectLoop {
                        url: next.to_string(),
                    });
                }

                tracing::debug!(from = %current, to = %next, status = status.as_u16(), "following redirect");
                chain.push(RedirectHop {
                    url: current.clone(),
                    status: status.as_u16(),
                    location: next.clone(),
                });
                current = next;
                continue;
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase();

            // servers that omit the header get the benefit of the doubt
            if !content_type.is_empty() && !content_type.contains("text/html") {
                return Err(FetchError::NotHtml {
                    url: current.to_string(),
                    content_type,
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| classify(&current, e))?;

            return Ok(FetchedPage {
                url: url.clone(),
                final_url: current,
                status: status.as_u16(),
                content_type,
                body,
                fetched_at: Utc::now(),
                redirect_chain: chain,
            });
        }
    }

    /// The underlying HTTP client, shared with the robots policy.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn classify(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_downloader(max_redirects: usize) -> Downloader {
        let config = FetchConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
            max_redirects,
        };
        Downloader::new(&config, "weft-test/0.1").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_plain_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(
                        "<html><body>hi</body></html>".as_bytes().to_vec(),
                        "text/html; charset=utf-8",
                    ),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let page = test_downloader(10).fetch(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.final_url, url);
        assert!(page.body.contains("hi"));
        assert!(page.redirect_chain.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects_and_records_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/middle"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/middle"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/end"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/end"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>done</html>".as_bytes().to_vec(), "text/html"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/start", server.uri())).unwrap();
        let page = test_downloader(10).fetch(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.final_url.path(), "/end");
        assert_eq!(page.redirect_chain.len(), 2);
        assert_eq!(page.redirect_chain[0].status, 301);
        assert_eq!(page.redirect_chain[1].location.path(), "/end");
    }

    #[tokio::test]
    async fn test_fetch_detects_redirect_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/a"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/a", server.uri())).unwrap();
        let err = test_downloader(10).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::RedirectLoop { .. }));
    }

    #[tokio::test]
    async fn test_fetch_enforces_redirect_limit() {
        let server = MockServer::start().await;
        for i in 0..5 {
            Mock::given(method("GET"))
                .and(path(format!("/hop{}", i)))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("location", format!("/hop{}", i + 1).as_str()),
                )
                .mount(&server)
                .await;
        }

        let url = Url::parse(&format!("{}/hop0", server.uri())).unwrap();
        let err = test_downloader(3).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::RedirectLimit { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0x25, 0x50, 0x44, 0x46])
                    .insert_header("content-type", "application/pdf"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/doc.pdf", server.uri())).unwrap();
        let err = test_downloader(10).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::NotHtml { .. }));
    }

    #[tokio::test]
    async fn test_fetch_missing_location_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bare"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/bare", server.uri())).unwrap();
        let err = test_downloader(10).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingLocation { .. }));
    }
}
