use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Everything a notifier needs to describe one detected status change.
#[derive(Debug, Clone, PartialEq)]
pub struct PostStatusParam {
    pub check_url: String,
    pub before_status_code: i32,
    pub current_status_code: i32,
    /// Transport error reported by the probe, if any.
    pub http_error: Option<String>,
    pub response_time_seconds: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown type: {0}")]
pub struct UnknownNotifierType(pub String);

/// The closed set of supported notification backends, selected by `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifierKind {
    Chatwork,
    Slack,
}

impl NotifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierKind::Chatwork => "chatwork",
            NotifierKind::Slack => "slack",
        }
    }

    /// Keys a target must define before it is checked with this backend.
    pub fn expected_keys(&self) -> &'static [&'static str] {
        match self {
            NotifierKind::Chatwork => &["type", "check_url", "api_token", "room_id"],
            NotifierKind::Slack => &["type", "check_url", "api_token", "channel"],
        }
    }
}

impl FromStr for NotifierKind {
    type Err = UnknownNotifierType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chatwork" => Ok(NotifierKind::Chatwork),
            "slack" => Ok(NotifierKind::Slack),
            other => Err(UnknownNotifierType(other.to_string())),
        }
    }
}

impl fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
