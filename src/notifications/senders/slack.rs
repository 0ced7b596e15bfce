use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{NotificationSender, SenderError, is_successful_status, rejection};
use crate::notifications::models::{NotifierKind, PostStatusParam};

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
pub const DEFAULT_USER_NAME: &str = "zatsu_monitor";

/// Posts status changes to a Slack channel, through the Web API or, when a
/// webhook URL is configured, through that incoming webhook.
pub struct SlackSender {
    client: Client,
    api_url: String,
    api_token: String,
    webhook_url: Option<String>,
    user_name: String,
    channel: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SlackMessage {
    pub channel: String,
    pub text: String,
    pub username: String,
    pub icon_emoji: &'static str,
}

#[derive(Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackSender {
    pub fn new(
        client: Client,
        api_token: String,
        webhook_url: Option<String>,
        user_name: Option<String>,
        channel: String,
    ) -> Self {
        let user_name = user_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_NAME.to_string());
        Self {
            client,
            api_url: DEFAULT_SLACK_API_URL.to_string(),
            api_token,
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
            user_name,
            channel,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn compose_message(&self, param: &PostStatusParam) -> SlackMessage {
        let (status_text, icon_emoji, suffix) = if is_successful_status(param.current_status_code) {
            ("ok", ":green_heart:", "Successful")
        } else {
            ("down", ":broken_heart:", "Failure")
        };

        let mut text = format!(
            "{} is {}\nstatusCode: {} -> {}\nresponseTime: {:.6} sec",
            param.check_url,
            status_text,
            param.before_status_code,
            param.current_status_code,
            param.response_time_seconds,
        );
        if let Some(http_error) = &param.http_error {
            text.push_str(&format!("\nhttpError: {http_error}"));
        }

        SlackMessage {
            channel: self.channel.clone(),
            text,
            username: format!("{} {}", self.user_name, suffix),
            icon_emoji,
        }
    }

    async fn post_webhook(&self, webhook_url: &str, message: &SlackMessage) -> Result<(), SenderError> {
        let response = self.client.post(webhook_url).json(message).send().await?;
        if !response.status().is_success() {
            return Err(rejection("Slack webhook", response).await);
        }
        Ok(())
    }

    async fn post_api(&self, message: &SlackMessage) -> Result<(), SenderError> {
        let url = format!("{}/chat.postMessage", self.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(message)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection("Slack API", response).await);
        }

        // The Web API reports most failures in the body of a 200 response.
        let body: SlackApiResponse = response.json().await?;
        if !body.ok {
            return Err(SenderError::SendFailed(format!(
                "Slack API rejected the message: {}",
                body.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for SlackSender {
    fn expected_keys(&self) -> &'static [&'static str] {
        NotifierKind::Slack.expected_keys()
    }

    async fn post_status(&self, param: &PostStatusParam) -> Result<(), SenderError> {
        let message = self.compose_message(param);
        match &self.webhook_url {
            Some(webhook_url) => self.post_webhook(webhook_url, &message).await,
            None => self.post_api(&message).await,
        }
    }
}
