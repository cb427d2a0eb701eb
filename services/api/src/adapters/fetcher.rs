//! services/api/src/adapters/fetcher.rs
//!
//! Downloads source pages and reduces their HTML to readable text for question
//! generation. Implements the `ContentFetcher` port.

use std::time::Duration;

use async_trait::async_trait;
use genfuze_core::ports::{ContentFetcher, PortError, PortResult};
use genfuze_core::prompts::MAX_CONTENT_CHARS;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; GenfuzeBot/1.0; +https://genfuze.ai)";

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "iframe", "canvas",
];

/// Elements that start and end a line of their own.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "td", "th",
    "tr", "ul",
];

#[derive(Clone)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Visible text of an HTML document, one line per block element, entities decoded
/// and runs of whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = VisibleText::default();
    text.walk(document.root_element());
    text.finish()
}

#[derive(Default)]
struct VisibleText {
    lines: Vec<String>,
    line: String,
    space: bool,
}

impl VisibleText {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.push_text(text);
            } else if let Some(child) = ElementRef::wrap(child) {
                let name = child.value().name();
                if HIDDEN_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    self.break_line();
                }
                self.walk(child);
                if block {
                    self.break_line();
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.starts_with(char::is_whitespace) {
            self.space = true;
        }
        for word in text.split_whitespace() {
            if self.space && !self.line.is_empty() {
                self.line.push(' ');
            }
            self.line.push_str(word);
            self.space = true;
        }
        self.space = text.ends_with(char::is_whitespace);
    }

    fn break_line(&mut self) {
        if !self.line.is_empty() {
            self.lines.push(std::mem::take(&mut self.line));
        }
        self.space = false;
    }

    fn finish(mut self) -> String {
        self.break_line();
        self.lines.join("\n")
    }
}

fn truncate(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_text(&self, url: &str) -> PortResult<String> {
        let parsed = url::Url::parse(url)
            .map_err(|e| PortError::InvalidInput(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PortError::InvalidInput(format!("Unsupported URL scheme in '{}'", url)));
        }

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Fetching {} returned {}", url, status);
            return Err(PortError::Upstream(format!("Fetching {} returned {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PortError::Upstream(format!("Failed to read {}: {}", url, e)))?;

        Ok(truncate(html_to_text(&html), MAX_CONTENT_CHARS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strips_hidden_elements_and_markup() {
        let html = r#"<html><head><title>T</title></head><body>
            <script>var x = "<p>nope</p>";</script>
            <h1>Generative   Engine</h1>
            <p>Optimisation &amp; <b>answers</b>&nbsp;today</p>
            <style>p { color: red }</style>
        </body></html>"#;
        assert_eq!(html_to_text(html), "Generative Engine\nOptimisation & answers today");
    }

    #[test]
    fn decodes_named_and_numeric_entities() {
        let html = "<p>It&#8217;s fast &mdash; and caf&eacute; &#x27;ok&#x27;</p>";
        assert_eq!(html_to_text(html), "It\u{2019}s fast \u{2014} and caf\u{e9} 'ok'");
    }

    #[test]
    fn inline_elements_stay_on_their_line() {
        let html = "<ul><li>Fast<em>er</em> answers</li><li>Cited <a href='/x'>sources</a></li></ul>";
        assert_eq!(html_to_text(html), "Faster answers\nCited sources");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate("caf\u{e9} au lait".to_string(), 4), "caf\u{e9}");
        assert_eq!(truncate("short".to_string(), 10), "short");
    }

    #[tokio::test]
    async fn fetches_and_reduces_a_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<article><p>Hello world</p></article>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpContentFetcher::new().unwrap();
        let text = fetcher.fetch_text(&format!("{}/post", server.uri())).await.unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn error_statuses_are_upstream_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpContentFetcher::new().unwrap();
        let result = fetcher.fetch_text(&format!("{}/missing", server.uri())).await;
        assert!(matches!(result, Err(PortError::Upstream(_))));
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let fetcher = HttpContentFetcher::new().unwrap();
        assert!(matches!(
            fetcher.fetch_text("file:///etc/passwd").await,
            Err(PortError::InvalidInput(_))
        ));
    }
}
