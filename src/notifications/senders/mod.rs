use async_trait::async_trait;
use thiserror::Error;

use super::models::PostStatusParam;

pub mod chatwork;
pub mod slack;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// A backend able to report a status change to humans.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Configuration keys that must be present for this backend.
    fn expected_keys(&self) -> &'static [&'static str];

    /// Formats and transmits the status change.
    async fn post_status(&self, param: &PostStatusParam) -> Result<(), SenderError>;
}

/// 2xx and 3xx count as successful.
pub fn is_successful_status(status_code: i32) -> bool {
    let class = status_code / 100;
    class == 2 || class == 3
}

/// Reads the body of a rejected response for the error message.
pub(crate) async fn rejection(service: &str, response: reqwest::Response) -> SenderError {
    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    SenderError::SendFailed(format!(
        "{service} returned non-success status: {status}. Body: {error_body}"
    ))
}
