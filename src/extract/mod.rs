//! Link extraction
//!
//! Pulls candidate crawl URLs out of an HTML body: `a[href]` anchors,
//! resolved against the page's base URL. Script/style/media references are
//! not links and are ignored, as are non-web schemes and fragment-only
//! hrefs.

use scraper::{Html, Selector};
use url::Url;

/// Extracts absolute http/https links from an HTML document.
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);

    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        // download links point at files, not pages
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(url) = resolve_link(href, base_url) {
                links.push(url);
            }
        }
    }
    links
}

/// Resolves one href against the base URL, filtering out anything that is
/// not a fetchable web page.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let trimmed = href.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut url = base_url.join(trimmed).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    // fragments never change what gets fetched
    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/section/page").unwrap()
    }

    #[test]
    fn test_extracts_absolute_and_relative_links() {
        let html = r#"
            <html><body>
                <a href="https://other.test/page">other</a>
                <a href="/root-relative">root</a>
                <a href="sibling">sibling</a>
            </body></html>
        "#;

        let links = extract_links(html, &base());
        assert_eq!(
            links,
            vec![
                Url::parse("https://other.test/page").unwrap(),
                Url::parse("https://example.com/root-relative").unwrap(),
                Url::parse("https://example.com/section/sibling").unwrap(),
            ]
        );
    }

    #[test]
    fn test_skips_non_web_schemes() {
        let html = r#"
            <a href="mailto:a@b.test">mail</a>
            <a href="javascript:void(0)">js</a>
            <a href="tel:+1234">call</a>
            <a href="ftp://example.com/file">ftp</a>
            <a href="https://example.com/ok">ok</a>
        "#;

        let links = extract_links(html, &base());
        assert_eq!(links, vec![Url::parse("https://example.com/ok").unwrap()]);
    }

    #[test]
    fn test_skips_fragments_and_download_links() {
        let html = r##"
            <a href="#top">top</a>
            <a href="/file.zip" download>zip</a>
            <a href="/page#section">page</a>
        "##;

        let links = extract_links(html, &base());
        assert_eq!(
            links,
            vec![Url::parse("https://example.com/page").unwrap()]
        );
    }

    #[test]
    fn test_empty_document() {
        assert!(extract_links("", &base()).is_empty());
        assert!(extract_links("<html><body>no links</body></html>", &base()).is_empty());
    }

    #[test]
    fn test_malformed_html_still_yields_links() {
        let html = r#"<p><a href="/a">one<a href="/b">two</p>"#;
        let links = extract_links(html, &base());
        assert_eq!(links.len(), 2);
    }
}
