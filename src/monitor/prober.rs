use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::time::Instant;

use crate::version::user_agent;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("invocation deadline exceeded")]
    DeadlineExceeded,
}

/// Result of a single GET. `status_code` is 0 whenever `error` is set.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub status_code: i32,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    fn failed(error: ProbeError) -> Self {
        Self {
            status_code: 0,
            error: Some(error),
        }
    }
}

/// Issues one GET per check and reports the status code.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    /// Builds a prober with its own client, bounded by `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Requests `url`, giving up at `deadline`. HTTP error statuses are
    /// reported as-is; transport failures and timeouts yield status 0.
    pub async fn check(&self, url: &str, deadline: Instant) -> ProbeOutcome {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent())
            .send();

        match tokio::time::timeout_at(deadline, request).await {
            // The body is never read; dropping the response releases it.
            Ok(Ok(response)) => ProbeOutcome {
                status_code: i32::from(response.status().as_u16()),
                error: None,
            },
            Ok(Err(e)) => ProbeOutcome::failed(ProbeError::Request(e)),
            Err(_) => ProbeOutcome::failed(ProbeError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn prober() -> HttpProber {
        HttpProber::new(Duration::from_secs(5)).unwrap()
    }

    fn in_ten_seconds() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    #[tokio::test]
    async fn reports_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .match_header("user-agent", Matcher::Regex(r"^Zatsu_Monitor/.+\(.+\)$".to_string()))
            .with_status(200)
            .with_body("fine")
            .create_async()
            .await;

        let outcome = prober()
            .check(&format!("{}/health", server.url()), in_ten_seconds())
            .await;
        assert_eq!(outcome.status_code, 200);
        assert!(outcome.error.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_status_is_not_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(500)
            .create_async()
            .await;

        let outcome = prober().check(&format!("{}/", server.url()), in_ten_seconds()).await;
        assert_eq!(outcome.status_code, 500);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn connection_failure_yields_zero() {
        // Port 1 is reserved and nothing listens on it.
        let outcome = prober().check("http://127.0.0.1:1/", in_ten_seconds()).await;
        assert_eq!(outcome.status_code, 0);
        assert!(matches!(outcome.error, Some(ProbeError::Request(_))));
    }

    #[tokio::test]
    async fn invalid_url_yields_zero() {
        let outcome = prober().check("not a url", in_ten_seconds()).await;
        assert_eq!(outcome.status_code, 0);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn expired_deadline_yields_zero() {
        let server = mockito::Server::new_async().await;
        let outcome = prober().check(&server.url(), Instant::now()).await;
        assert_eq!(outcome.status_code, 0);
        assert!(matches!(outcome.error, Some(ProbeError::DeadlineExceeded)));
    }
}
