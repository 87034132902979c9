//! Article text fetcher

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use summary_notifier_domain::{ArticleFetcher, FetchError};

/// Longest description taken from an update page, in characters
const MAX_DESCRIPTION_CHARS: usize = 2000;
/// Elements whose text is never shown
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];
const CONTENT_CLASSES: [&str; 3] = ["collapse", "accordion-collapse", "content"];

static MAIN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("main").expect("valid selector"));
static DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").expect("valid selector"));
static STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"LAUNCHED|IN PREVIEW|IN DEVELOPMENT|General availability|Preview|Public preview")
        .expect("valid regex")
});

/// Fetches article pages and extracts their readable text.
///
/// Blog posts yield the text of their `<main>` element. Update listing
/// pages addressed as `.../updates?id=<id>` yield the title, status and
/// description of the `div#accordion-<id>` entry.
pub struct HttpArticleFetcher {
    client: Client,
}

impl HttpArticleFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        let lower = url.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            tracing::warn!(url = %url, "Refusing to fetch non-HTTP article URL");
            return Ok(None);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(match update_id(url) {
            Some(id) => extract_update(&html, &id),
            None => extract_main_text(&html),
        })
    }
}

/// The `id` query parameter of an `.../updates?id=<id>` URL
pub fn update_id(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let last_segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if last_segment != "updates" {
        return None;
    }

    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Text content of the first `<main>` element, one line per text line
pub fn extract_main_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let main = document.select(&MAIN).next()?;

    let lines = text_lines(&visible_text(main));
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

/// Title, status and description of one entry of an update listing page.
///
/// Falls back to the page's first heading and `<main>` text when the
/// entry is missing.
pub fn extract_update(html: &str, id: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let accordion_id = format!("accordion-{}", id);

    let parts = match document
        .select(&DIV)
        .find(|div| div.value().id() == Some(accordion_id.as_str()))
    {
        Some(accordion) => accordion_parts(accordion),
        None => {
            tracing::warn!(element = %accordion_id, "Update entry not found, using page content");
            fallback_parts(&document)
        }
    };

    if parts.is_empty() {
        return None;
    }
    Some(parts.join("\n\n"))
}

fn accordion_parts(accordion: ElementRef<'_>) -> Vec<String> {
    let mut parts = Vec::new();

    let title = child_elements(accordion)
        .find(|e| is_heading(e))
        .or_else(|| child_elements(accordion).find(|e| matches!(e.value().name(), "button" | "a")));
    if let Some(title) = title.map(inline_text).filter(|t| !t.is_empty()) {
        parts.push(format!("Title: {}", title));
    }

    let content = child_elements(accordion)
        .filter(|e| e.value().name() == "div")
        .find(|div| div.value().classes().any(|c| CONTENT_CLASSES.contains(&c)))
        .or_else(|| {
            child_elements(accordion)
                .filter(|e| e.value().name() == "div")
                .nth(1)
        });

    match content {
        Some(content) => {
            let status = text_nodes(content)
                .find(|text| STATUS.is_match(text))
                .map(str::trim);
            if let Some(status) = status {
                parts.push(format!("Status: {}", status));
            }
            parts.push(format!("Description: {}", truncate(&inline_text(content))));
        }
        None => {
            parts.push(format!("Description: {}", truncate(&inline_text(accordion))));
        }
    }

    parts
}

fn fallback_parts(document: &Html) -> Vec<String> {
    let root = document.root_element();
    let mut parts = Vec::new();

    let title = ["h1", "h2", "h3"]
        .iter()
        .find_map(|tag| child_elements(root).find(|e| e.value().name() == *tag));
    if let Some(title) = title.map(inline_text).filter(|t| !t.is_empty()) {
        parts.push(format!("Title: {}", title));
    }

    if let Some(main) = document.select(&MAIN).next() {
        parts.push(format!("Description: {}", truncate(&inline_text(main))));
    }

    parts
}

/// Descendant elements of `scope`, excluding `scope` itself
fn child_elements<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    scope.descendants().skip(1).filter_map(ElementRef::wrap)
}

fn is_heading(element: &ElementRef<'_>) -> bool {
    matches!(element.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Text nodes under `scope` that are rendered
fn text_nodes<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    scope.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        (!hidden).then_some(&**text)
    })
}

fn visible_text(scope: ElementRef<'_>) -> String {
    text_nodes(scope).collect()
}

/// Visible text on a single line with whitespace collapsed
fn inline_text(scope: ElementRef<'_>) -> String {
    visible_text(scope)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title>t</title></head>
<body>
  <nav>Menu</nav>
  <main id="content">
    <h1>New   feature</h1>
    <script>var x = "<b>";</script>
    <p>Now available in <b>all</b> regions &amp; partitions.</p>
  </main>
</body></html>"#;

    const UPDATES_PAGE: &str = r#"<html><body>
  <h1>Azure updates</h1>
  <main>
    <div id="accordion-111">
      <h3>Other update</h3>
      <div class="accordion-collapse">Not this one</div>
    </div>
    <div id="accordion-534523">
      <button><span>Generally available:</span> Azure Functions Flex Consumption</button>
      <div class="accordion-collapse collapse">
        <p>LAUNCHED</p>
        <p>Flex Consumption is now generally available &#8212; it&#8217;s faster.</p>
      </div>
    </div>
  </main>
</body></html>"#;

    #[test]
    fn test_extract_main_text() {
        let text = extract_main_text(PAGE).unwrap();
        assert_eq!(text, "New feature\nNow available in all regions & partitions.");
    }

    #[test]
    fn test_extract_main_text_decodes_entities() {
        let text = extract_main_text(
            "<main><p>It&#8217;s &eacute;t&eacute; &#x2014; &lt;ok&gt;&nbsp;now</p></main>",
        )
        .unwrap();
        assert_eq!(text, "It\u{2019}s \u{e9}t\u{e9} \u{2014} <ok> now");
    }

    #[test]
    fn test_page_without_main() {
        assert_eq!(extract_main_text("<html><body><p>hi</p></body></html>"), None);
    }

    #[test]
    fn test_update_id() {
        assert_eq!(
            update_id("https://azure.microsoft.com/updates?id=534523").as_deref(),
            Some("534523")
        );
        assert_eq!(
            update_id("https://azure.microsoft.com/en-us/updates/?id=42").as_deref(),
            Some("42")
        );
        assert_eq!(update_id("https://azure.microsoft.com/updates"), None);
        assert_eq!(update_id("https://aws.amazon.com/blogs/aws/post?id=1"), None);
    }

    #[test]
    fn test_extract_update_entry() {
        let text = extract_update(UPDATES_PAGE, "534523").unwrap();
        assert_eq!(
            text,
            "Title: Generally available: Azure Functions Flex Consumption\n\n\
             Status: LAUNCHED\n\n\
             Description: LAUNCHED Flex Consumption is now generally available \u{2014} it\u{2019}s faster."
        );
    }

    #[test]
    fn test_extract_update_falls_back_to_main() {
        let text = extract_update(UPDATES_PAGE, "999").unwrap();
        assert!(text.starts_with("Title: Azure updates\n\nDescription: Other update"));
    }

    #[test]
    fn test_long_description_is_truncated() {
        let body = "x".repeat(MAX_DESCRIPTION_CHARS + 10);
        let html = format!(
            r#"<div id="accordion-7"><h2>T</h2><div class="content">{}</div></div>"#,
            body
        );

        let text = extract_update(&html, "7").unwrap();
        let description = text.split("Description: ").nth(1).unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS + 3);
        assert!(description.ends_with("..."));
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&mock_server)
            .await;

        let fetcher = HttpArticleFetcher::new(Duration::from_secs(5)).unwrap();
        let text = fetcher
            .fetch_text(&format!("{}/post", mock_server.uri()))
            .await
            .unwrap();

        assert!(text.unwrap().starts_with("New feature"));
    }

    #[tokio::test]
    async fn test_fetch_text_of_update_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/updates"))
            .and(query_param("id", "534523"))
            .respond_with(ResponseTemplate::new(200).set_body_string(UPDATES_PAGE))
            .mount(&mock_server)
            .await;

        let fetcher = HttpArticleFetcher::new(Duration::from_secs(5)).unwrap();
        let text = fetcher
            .fetch_text(&format!("{}/updates?id=534523", mock_server.uri()))
            .await
            .unwrap()
            .unwrap();

        assert!(text.starts_with("Title: Generally available: Azure Functions Flex Consumption"));
        assert!(text.contains("Status: LAUNCHED"));
    }

    #[tokio::test]
    async fn test_fetch_text_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpArticleFetcher::new(Duration::from_secs(5)).unwrap();
        let result = fetcher
            .fetch_text(&format!("{}/post", mock_server.uri()))
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_non_http_url_is_ignored() {
        let fetcher = HttpArticleFetcher::new(Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.fetch_text("file:///etc/passwd").await.unwrap(), None);
    }
}
