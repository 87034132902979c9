//! RSS feed source

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use summary_notifier_domain::{Feed, FeedEntry, FeedError, FeedSource};
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

/// Downloads feeds over HTTP and parses them as RSS 2.0
pub struct RssFeedSource {
    client: Client,
}

impl RssFeedSource {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| FeedError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        parse_feed(&body)
    }
}

/// Parse an RSS document.
///
/// The feed's update time is its last build date, falling back to its
/// publication date.
pub fn parse_feed(body: &[u8]) -> Result<Feed, FeedError> {
    let channel = rss::Channel::read_from(body).map_err(|e| FeedError::Parse(e.to_string()))?;

    let updated = channel
        .last_build_date()
        .or(channel.pub_date())
        .and_then(parse_date);

    let entries = channel
        .items()
        .iter()
        .filter_map(|item| {
            let Some(link) = item.link() else {
                tracing::debug!(title = ?item.title(), "Entry without link, skipping");
                return None;
            };
            Some(FeedEntry {
                title: item.title().unwrap_or_default().trim().to_string(),
                link: link.trim().to_string(),
                published: item.pub_date().and_then(parse_date),
                categories: item
                    .categories()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
            })
        })
        .collect();

    Ok(Feed { updated, entries })
}

/// Parse an RFC 2822 date, tolerating named UTC zones and RFC 3339
pub fn parse_date(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if let Ok(date) = OffsetDateTime::parse(value, &Rfc2822) {
        return Some(date);
    }

    for zone in [" GMT", " UTC", " UT", " Z"] {
        if let Some(stripped) = value.strip_suffix(zone) {
            let normalized = format!("{} +0000", stripped);
            if let Ok(date) = OffsetDateTime::parse(&normalized, &Rfc2822) {
                return Some(date);
            }
        }
    }

    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(date) => Some(date),
        Err(_) => {
            tracing::debug!(value = %value, "Unparseable feed date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Recent Announcements</title>
    <link>https://aws.amazon.com/about-aws/whats-new/recent/</link>
    <description>What's new</description>
    <lastBuildDate>Mon, 10 Jun 2024 18:00:00 GMT</lastBuildDate>
    <item>
      <title> Amazon S3 gets faster </title>
      <link>https://aws.amazon.com/about-aws/whats-new/2024/06/s3-faster/</link>
      <pubDate>Mon, 10 Jun 2024 17:00:00 +0000</pubDate>
      <category>general:products/amazon-s3,marketing:marchitecture/storage</category>
    </item>
    <item>
      <title>Undated</title>
      <link>https://aws.amazon.com/undated/</link>
    </item>
    <item>
      <title>No link</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed() {
        let feed = parse_feed(FEED.as_bytes()).unwrap();

        assert_eq!(feed.updated, Some(datetime!(2024-06-10 18:00 UTC)));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title, "Amazon S3 gets faster");
        assert_eq!(first.published, Some(datetime!(2024-06-10 17:00 UTC)));
        assert_eq!(
            first.categories,
            vec!["general:products/amazon-s3,marketing:marchitecture/storage"]
        );

        assert_eq!(feed.entries[1].published, None);
    }

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(
            parse_date("Tue, 20 Sep 2022 16:05:47 +0000"),
            Some(datetime!(2022-09-20 16:05:47 UTC))
        );
        assert_eq!(
            parse_date("Tue, 20 Sep 2022 16:05:47 UTC"),
            Some(datetime!(2022-09-20 16:05:47 UTC))
        );
        assert_eq!(
            parse_date("2022-09-20T16:05:47+09:00"),
            Some(datetime!(2022-09-20 16:05:47 +9))
        );
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            parse_feed(b"<html>not a feed</html>"),
            Err(FeedError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_feed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&mock_server)
            .await;

        let source = RssFeedSource::new(Duration::from_secs(5)).unwrap();
        let feed = source
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(feed.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_feed_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = RssFeedSource::new(Duration::from_secs(5)).unwrap();
        let result = source.fetch(&format!("{}/feed", mock_server.uri())).await;

        assert!(matches!(result, Err(FeedError::Status { status: 503, .. })));
    }
}
