use super::alert::{AlertEvent, AlertSink};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::Level;
use url::Url;

const MAX_EMBED_FIELDS: usize = 20;
const MAX_FIELD_VALUE: usize = 1000;
const MAX_DESCRIPTION: usize = 3500;

/// Posts alerts to a Discord channel webhook as a single embed.
pub(crate) struct DiscordAlertSink {
    webhook_url: Url,
    client: Client,
}

impl DiscordAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .context("failed to build ops alert http client")?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

fn level_color(level: Level) -> u32 {
    match level {
        Level::ERROR => 0xE74C3C,
        Level::WARN => 0xF1C40F,
        _ => 0x3498DB,
    }
}

fn clip(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

pub(crate) fn build_payload(event: &AlertEvent) -> Value {
    let mut description = clip(event.message.trim(), MAX_DESCRIPTION);
    if !event.span_path.is_empty() {
        description.push_str(&format!("\n`{}`", event.span_path.join(" > ")));
    }

    let mut fields: Vec<Value> = event
        .fields
        .iter()
        .take(MAX_EMBED_FIELDS)
        .map(|(name, value)| {
            json!({
                "name": name,
                "value": format!("`{}`", clip(value, MAX_FIELD_VALUE)),
                "inline": value.len() <= 40,
            })
        })
        .collect();

    if let Some(location) = &event.location {
        fields.push(json!({ "name": "at", "value": format!("`{}`", location), "inline": false }));
    }

    json!({
        "embeds": [{
            "title": format!(
                "{} {} [{}] {}",
                event.level, event.service_name, event.stage, event.component
            ),
            "description": description,
            "color": level_color(event.level),
            "fields": fields,
            "footer": { "text": event.target },
            "timestamp": event.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }]
    })
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&build_payload(event))
            .send()
            .await
            // reqwest errors carry the url, which carries the webhook token.
            .map_err(|err| anyhow!("discord webhook request failed (timeout: {})", err.is_timeout()))?;

        if !response.status().is_success() {
            return Err(anyhow!("discord webhook answered {}", response.status()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
