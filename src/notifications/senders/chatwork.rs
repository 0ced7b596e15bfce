use async_trait::async_trait;
use reqwest::Client;

use super::{NotificationSender, SenderError, is_successful_status, rejection};
use crate::notifications::models::{NotifierKind, PostStatusParam};

pub const DEFAULT_CHATWORK_API_URL: &str = "https://api.chatwork.com/v2";

const TOKEN_HEADER: &str = "X-ChatWorkToken";

/// Posts status changes to a Chatwork room.
pub struct ChatworkSender {
    client: Client,
    api_url: String,
    api_token: String,
    room_id: String,
}

impl ChatworkSender {
    pub fn new(client: Client, api_token: String, room_id: String) -> Self {
        Self {
            client,
            api_url: DEFAULT_CHATWORK_API_URL.to_string(),
            api_token,
            room_id,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn compose_message(param: &PostStatusParam) -> String {
        let status_text = if is_successful_status(param.current_status_code) {
            "ok"
        } else {
            "down"
        };

        let mut message = format!(
            "[info][title]{} is {}[/title]statusCode: {} -> {}\nresponseTime: {:.6} sec",
            param.check_url,
            status_text,
            param.before_status_code,
            param.current_status_code,
            param.response_time_seconds,
        );
        if let Some(http_error) = &param.http_error {
            message.push_str(&format!("\nhttpError: {http_error}"));
        }
        message.push_str("[/info]");
        message
    }
}

#[async_trait]
impl NotificationSender for ChatworkSender {
    fn expected_keys(&self) -> &'static [&'static str] {
        NotifierKind::Chatwork.expected_keys()
    }

    async fn post_status(&self, param: &PostStatusParam) -> Result<(), SenderError> {
        let url = format!("{}/rooms/{}/messages", self.api_url, self.room_id);
        let message = Self::compose_message(param);

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &self.api_token)
            .form(&[("body", message.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection("Chatwork API", response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn param(before: i32, current: i32, http_error: Option<&str>) -> PostStatusParam {
        PostStatusParam {
            check_url: "https://example.com/".to_string(),
            before_status_code: before,
            current_status_code: current,
            http_error: http_error.map(str::to_string),
            response_time_seconds: 0.25,
        }
    }

    #[test]
    fn message_for_outage() {
        let message = ChatworkSender::compose_message(&param(200, 500, None));
        assert_eq!(
            message,
            "[info][title]https://example.com/ is down[/title]statusCode: 200 -> 500\nresponseTime: 0.250000 sec[/info]"
        );
    }

    #[test]
    fn message_for_recovery_with_error_line() {
        let message = ChatworkSender::compose_message(&param(0, 200, Some("timed out")));
        assert!(message.starts_with("[info][title]https://example.com/ is ok[/title]"));
        assert!(message.contains("statusCode: 0 -> 200"));
        assert!(message.ends_with("\nhttpError: timed out[/info]"));
    }

    #[test]
    fn targets_public_api_unless_overridden() {
        let sender = ChatworkSender::new(Client::new(), "t".to_string(), "1".to_string());
        assert_eq!(sender.api_url(), DEFAULT_CHATWORK_API_URL);

        let sender = sender.with_api_url("http://127.0.0.1:9000/v2/");
        assert_eq!(sender.api_url(), "http://127.0.0.1:9000/v2");
    }

    #[tokio::test]
    async fn posts_form_with_token_header() {
        let mut server = mockito::Server::new_async().await;
        let expected_body = ChatworkSender::compose_message(&param(200, 503, None));
        let mock = server
            .mock("POST", "/rooms/42/messages")
            .match_header("x-chatworktoken", "secret")
            .match_body(Matcher::UrlEncoded("body".into(), expected_body))
            .with_status(200)
            .with_body(r#"{"message_id":"1"}"#)
            .create_async()
            .await;

        let sender = ChatworkSender::new(Client::new(), "secret".to_string(), "42".to_string())
            .with_api_url(server.url());
        sender.post_status(&param(200, 503, None)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_post_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rooms/42/messages")
            .with_status(401)
            .with_body(r#"{"errors":["Invalid API token"]}"#)
            .create_async()
            .await;

        let sender = ChatworkSender::new(Client::new(), "bad".to_string(), "42".to_string())
            .with_api_url(server.url());
        let err = sender.post_status(&param(200, 503, None)).await.unwrap_err();
        match err {
            SenderError::SendFailed(msg) => assert!(msg.contains("Invalid API token")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
