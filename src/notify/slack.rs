use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::Notifier;

const DEFAULT_API_URL: &str = "https://slack.com/api/chat.postMessage";

pub struct SlackNotifier {
    token: String,
    api_url: String,
    client: Client,
}

impl SlackNotifier {
    /// `None` when `SLACK_BOT_TOKEN` is unset; callers fall back to the
    /// no-op notifier.
    pub fn from_env(client: Client) -> Option<Self> {
        std::env::var("SLACK_BOT_TOKEN")
            .ok()
            .map(|token| Self::new(client, token))
    }

    pub fn new(client: Client, token: String) -> Self {
        Self {
            token,
            api_url: DEFAULT_API_URL.to_string(),
            client,
        }
    }

    /// Override the API endpoint, for tests and tooling.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

/// Slack reports most failures inside a 200 response; the `ok` flag is
/// the real status.
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({ "channel": channel, "text": text });

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;

        let parsed: PostMessageResponse = resp.json().await.context("slack response body")?;
        if !parsed.ok {
            bail!(
                "slack rejected message: {}",
                parsed.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
