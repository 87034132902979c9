//! Rendering - turns a summarized feed item into a destination message

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    config::Destination,
    model::{FeedItem, Summary},
};

/// Flat item document, also the body of plain Slack workflow messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationItem {
    pub rss_category: String,
    pub rss_time: String,
    pub rss_title: String,
    pub rss_link: String,
    pub rss_notifier_name: String,
    pub summary: String,
    pub detail: String,
    #[serde(skip)]
    pub service_categories: Vec<String>,
}

impl NotificationItem {
    pub fn new(item: &FeedItem, summary: &Summary) -> Self {
        let rss_time = item
            .pubtime
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self {
            rss_category: item.category.clone(),
            rss_time,
            rss_title: item.title.clone(),
            rss_link: item.url.clone(),
            rss_notifier_name: item.notifier_name.clone(),
            summary: summary.summary.clone(),
            detail: summary.detail.clone(),
            service_categories: item.service_categories.clone(),
        }
    }
}

/// Render the message body for a destination
pub fn render_message(destination: &Destination, item: &NotificationItem) -> Value {
    match destination {
        Destination::Slack { .. } => json!(item),
        Destination::SlackBlocks { .. } => slack_blocks(item),
        Destination::Teams { .. } => teams_card(item),
    }
}

fn service_badges(item: &NotificationItem) -> Option<String> {
    if item.service_categories.is_empty() {
        return None;
    }
    Some(format!("```\n{}\n```", item.service_categories.join(" | ")))
}

/// Detail lines without bullets or blanks
fn detail_lines(detail: &str) -> Vec<&str> {
    detail
        .split('\n')
        .map(|line| line.trim_start_matches(['-', ' ']).trim_end())
        .filter(|line| !line.is_empty())
        .collect()
}

fn slack_blocks(item: &NotificationItem) -> Value {
    let bullets: Vec<Value> = detail_lines(&item.detail)
        .into_iter()
        .map(|line| {
            json!({
                "type": "rich_text_section",
                "elements": [{"type": "text", "text": line}],
            })
        })
        .collect();

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": item.rss_title},
        }),
        json!({
            "type": "section",
            "fields": [
                {"type": "mrkdwn", "text": format!("*Category:* {}", item.rss_category)},
                {"type": "mrkdwn", "text": format!("*Posted:* :clock1: {}", item.rss_time)},
            ],
        }),
    ];

    if let Some(badges) = service_badges(item) {
        blocks.push(json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("*Services*\n{}", badges)},
        }));
    }

    blocks.push(json!({
        "type": "section",
        "text": {"type": "plain_text", "text": item.summary},
    }));
    blocks.push(json!({
        "type": "rich_text",
        "elements": [{
            "type": "rich_text_list",
            "style": "bullet",
            "indent": 0,
            "elements": bullets,
        }],
    }));
    blocks.push(json!({
        "type": "section",
        "text": {"type": "plain_text", "text": ":link: Click the button to open the article."},
        "accessory": {
            "type": "button",
            "text": {"type": "plain_text", "text": "Open"},
            "value": "open_article",
            "url": item.rss_link,
            "action_id": "button-action",
        },
    }));

    json!({ "blocks": blocks })
}

fn teams_card(item: &NotificationItem) -> Value {
    // Teams renders a bare newline after a Japanese full stop as a paragraph break
    let detail = item.detail.replace("。\n", "。\r");

    let mut collapsed = vec![
        json!({"type": "TextBlock", "text": format!("**{}**", item.rss_title)}),
        json!({
            "type": "TextBlock",
            "text": format!("{} Posted at: {}", item.rss_category, item.rss_time),
        }),
    ];
    if let Some(badges) = service_badges(item) {
        collapsed.push(json!({
            "type": "TextBlock",
            "text": badges,
            "wrap": true,
            "spacing": "Small",
        }));
    }
    collapsed.push(json!({"type": "TextBlock", "wrap": true, "text": item.summary}));

    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": {
                "type": "AdaptiveCard",
                "version": "1.3",
                "body": [
                    {
                        "type": "ColumnSet",
                        "columns": [{
                            "type": "Column",
                            "width": "auto",
                            "items": [
                                {"type": "Container", "id": "collapsedItems", "items": collapsed},
                                {
                                    "type": "Container",
                                    "id": "expandedItems",
                                    "isVisible": false,
                                    "items": [{"type": "TextBlock", "wrap": true, "text": detail}],
                                },
                            ],
                        }],
                    },
                    {
                        "type": "Container",
                        "items": [{
                            "type": "ColumnSet",
                            "columns": [{
                                "type": "Column",
                                "width": "stretch",
                                "items": [
                                    {
                                        "type": "TextBlock",
                                        "text": "see less",
                                        "id": "collapse",
                                        "isVisible": false,
                                        "wrap": true,
                                        "color": "Accent",
                                    },
                                    {
                                        "type": "TextBlock",
                                        "text": "see more",
                                        "id": "expand",
                                        "wrap": true,
                                        "color": "Accent",
                                    },
                                ],
                            }],
                            "selectAction": {
                                "type": "Action.ToggleVisibility",
                                "targetElements": ["collapse", "expand", "expandedItems"],
                            },
                        }],
                    },
                ],
                "actions": [{
                    "type": "Action.OpenUrl",
                    "title": "Open Link",
                    "wrap": true,
                    "url": item.rss_link,
                }],
                "msteams": {"width": "Full"},
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Channel;
    use time::macros::datetime;

    fn item(services: &[&str]) -> NotificationItem {
        let feed_item = FeedItem {
            url: "https://example.com/post".to_string(),
            notifier_name: "aws-blog".to_string(),
            title: "New feature".to_string(),
            category: "What's new".to_string(),
            pubtime: datetime!(2024-06-10 09:30 UTC),
            created_at: datetime!(2024-06-10 10:00 UTC),
            service_categories: services.iter().map(|s| s.to_string()).collect(),
            marketing_architectures: vec![],
        };
        let summary = Summary {
            summary: "It got faster.".to_string(),
            detail: "- First point。\n- Second point\n\n".to_string(),
        };
        NotificationItem::new(&feed_item, &summary)
    }

    fn webhook() -> Channel {
        Channel::Webhook {
            parameter_name: "/hook".to_string(),
        }
    }

    #[test]
    fn test_slack_is_flat_item() {
        let body = render_message(&Destination::Slack { channel: webhook() }, &item(&["amazon-s3"]));

        assert_eq!(body["rss_link"], "https://example.com/post");
        assert_eq!(body["rss_time"], "2024-06-10T09:30:00Z");
        assert_eq!(body["rss_notifier_name"], "aws-blog");
        assert_eq!(body["summary"], "It got faster.");
        assert!(body.get("service_categories").is_none());
    }

    #[test]
    fn test_slack_blocks_bullets_and_badges() {
        let body = render_message(
            &Destination::SlackBlocks { channel: webhook() },
            &item(&["amazon-s3", "aws-lambda"]),
        );
        let blocks = body["blocks"].as_array().unwrap();

        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[0]["text"]["text"], "New feature");
        assert_eq!(blocks[2]["text"]["text"], "*Services*\n```\namazon-s3 | aws-lambda\n```");

        let bullets = blocks[4]["elements"][0]["elements"].as_array().unwrap();
        assert_eq!(bullets.len(), 2);
        assert_eq!(bullets[0]["elements"][0]["text"], "First point。");
        assert_eq!(bullets[1]["elements"][0]["text"], "Second point");

        assert_eq!(blocks[5]["accessory"]["url"], "https://example.com/post");
    }

    #[test]
    fn test_slack_blocks_without_services_has_no_badge_section() {
        let body = render_message(&Destination::SlackBlocks { channel: webhook() }, &item(&[]));
        assert_eq!(body["blocks"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_teams_card_rewrites_full_stop_newlines() {
        let body = render_message(&Destination::Teams { channel: webhook() }, &item(&[]));
        let content = &body["attachments"][0]["content"];

        assert_eq!(content["version"], "1.3");
        let expanded = &content["body"][0]["columns"][0]["items"][1];
        assert_eq!(expanded["id"], "expandedItems");
        assert_eq!(expanded["items"][0]["text"], "- First point。\r- Second point\n\n");
        assert_eq!(content["actions"][0]["url"], "https://example.com/post");
    }
}
