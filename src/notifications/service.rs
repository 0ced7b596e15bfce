use std::fmt;

use reqwest::Client;

use super::models::{NotifierKind, UnknownNotifierType};
use super::senders::NotificationSender;
use super::senders::chatwork::{ChatworkSender, DEFAULT_CHATWORK_API_URL};
use super::senders::slack::{DEFAULT_SLACK_API_URL, SlackSender};
use crate::config::MonitorTarget;

/// Builds the notification sender for a target.
pub trait NotifierFactory: Send + Sync {
    fn create(&self, kind: NotifierKind, target: &MonitorTarget) -> Box<dyn NotificationSender>;
}

/// Base URLs of the chat services. Overridable for tests and proxies.
#[derive(Debug, Clone)]
pub struct NotifierEndpoints {
    pub chatwork_api_url: String,
    pub slack_api_url: String,
}

impl Default for NotifierEndpoints {
    fn default() -> Self {
        Self {
            chatwork_api_url: DEFAULT_CHATWORK_API_URL.to_string(),
            slack_api_url: DEFAULT_SLACK_API_URL.to_string(),
        }
    }
}

/// Creates real HTTP senders sharing one client.
#[derive(Clone)]
pub struct HttpNotifierFactory {
    client: Client,
    endpoints: NotifierEndpoints,
}

impl HttpNotifierFactory {
    pub fn new(client: Client) -> Self {
        Self::with_endpoints(client, NotifierEndpoints::default())
    }

    pub fn with_endpoints(client: Client, endpoints: NotifierEndpoints) -> Self {
        Self { client, endpoints }
    }
}

impl NotifierFactory for HttpNotifierFactory {
    fn create(&self, kind: NotifierKind, target: &MonitorTarget) -> Box<dyn NotificationSender> {
        match kind {
            NotifierKind::Chatwork => Box::new(
                ChatworkSender::new(
                    self.client.clone(),
                    target.value_or_empty("api_token"),
                    target.value_or_empty("room_id"),
                )
                .with_api_url(self.endpoints.chatwork_api_url.clone()),
            ),
            NotifierKind::Slack => Box::new(
                SlackSender::new(
                    self.client.clone(),
                    target.value_or_empty("api_token"),
                    target.get("webhook_url").map(str::to_string),
                    target.get("user_name").map(str::to_string),
                    target.value_or_empty("channel"),
                )
                .with_api_url(self.endpoints.slack_api_url.clone()),
            ),
        }
    }
}

/// Picks the backend named by the target's `type` and builds its sender.
pub fn resolve_notifier(
    factory: &dyn NotifierFactory,
    target: &MonitorTarget,
) -> Result<(NotifierKind, Box<dyn NotificationSender>), UnknownNotifierType> {
    let kind: NotifierKind = target.get("type").unwrap_or_default().parse()?;
    Ok((kind, factory.create(kind, target)))
}

/// First required key the target does not define, if any.
pub fn missing_key(sender: &dyn NotificationSender, target: &MonitorTarget) -> Option<&'static str> {
    missing_keys(sender, target).into_iter().next()
}

fn missing_keys(sender: &dyn NotificationSender, target: &MonitorTarget) -> Vec<&'static str> {
    sender
        .expected_keys()
        .iter()
        .copied()
        .filter(|key| !target.values.contains_key(*key))
        .collect()
}

/// How a target would be handled by a run, decided without touching the network.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetReadiness {
    Ready(NotifierKind),
    Skipped {
        kind: NotifierKind,
        missing: Vec<&'static str>,
    },
    Invalid(UnknownNotifierType),
}

impl fmt::Display for TargetReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetReadiness::Ready(kind) => write!(f, "{kind} (ready)"),
            TargetReadiness::Skipped { kind, missing } => {
                write!(f, "{kind} (skipped, missing {})", missing.join(", "))
            }
            TargetReadiness::Invalid(e) => write!(f, "invalid ({e})"),
        }
    }
}

/// Applies the same backend selection and key gate as a real check.
pub fn target_readiness(factory: &dyn NotifierFactory, target: &MonitorTarget) -> TargetReadiness {
    match resolve_notifier(factory, target) {
        Ok((kind, sender)) => {
            let missing = missing_keys(sender.as_ref(), target);
            if missing.is_empty() {
                TargetReadiness::Ready(kind)
            } else {
                TargetReadiness::Skipped { kind, missing }
            }
        }
        Err(e) => TargetReadiness::Invalid(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn target(pairs: &[(&str, &str)]) -> MonitorTarget {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MonitorTarget::new("site", values)
    }

    #[test]
    fn resolves_backend_from_type() {
        let factory = HttpNotifierFactory::new(Client::new());

        let (kind, sender) = resolve_notifier(&factory, &target(&[("type", "chatwork")])).unwrap();
        assert_eq!(kind, NotifierKind::Chatwork);
        assert_eq!(sender.expected_keys(), NotifierKind::Chatwork.expected_keys());

        let (kind, _) = resolve_notifier(&factory, &target(&[("type", "slack")])).unwrap();
        assert_eq!(kind, NotifierKind::Slack);
    }

    #[test]
    fn unknown_or_missing_type_is_rejected() {
        let factory = HttpNotifierFactory::new(Client::new());
        let err = resolve_notifier(&factory, &target(&[("type", "pager")])).err().unwrap();
        assert_eq!(err, UnknownNotifierType("pager".to_string()));
        assert!(resolve_notifier(&factory, &target(&[])).is_err());
    }

    #[test]
    fn reports_first_missing_key() {
        let factory = HttpNotifierFactory::new(Client::new());
        let incomplete = target(&[("type", "chatwork"), ("check_url", "https://x/"), ("room_id", "1")]);
        let (_, sender) = resolve_notifier(&factory, &incomplete).unwrap();
        assert_eq!(missing_key(sender.as_ref(), &incomplete), Some("api_token"));

        let complete = target(&[
            ("type", "chatwork"),
            ("check_url", "https://x/"),
            ("room_id", "1"),
            ("api_token", ""),
        ]);
        assert_eq!(missing_key(sender.as_ref(), &complete), None);
    }

    #[test]
    fn readiness_reports_ready_targets() {
        let factory = HttpNotifierFactory::new(Client::new());
        let slack = target(&[
            ("type", "slack"),
            ("check_url", "https://x/"),
            ("api_token", "xoxb"),
            ("channel", "#ops"),
        ]);

        let readiness = target_readiness(&factory, &slack);
        assert_eq!(readiness, TargetReadiness::Ready(NotifierKind::Slack));
        assert_eq!(readiness.to_string(), "slack (ready)");
    }

    #[test]
    fn readiness_lists_every_missing_key() {
        let factory = HttpNotifierFactory::new(Client::new());
        let incomplete = target(&[("type", "chatwork"), ("check_url", "https://x/")]);

        let readiness = target_readiness(&factory, &incomplete);
        assert_eq!(
            readiness,
            TargetReadiness::Skipped {
                kind: NotifierKind::Chatwork,
                missing: vec!["api_token", "room_id"],
            }
        );
        assert_eq!(readiness.to_string(), "chatwork (skipped, missing api_token, room_id)");
    }

    #[test]
    fn readiness_flags_unknown_type() {
        let factory = HttpNotifierFactory::new(Client::new());

        let readiness = target_readiness(&factory, &target(&[("type", "pager")]));
        assert_eq!(readiness, TargetReadiness::Invalid(UnknownNotifierType("pager".to_string())));
        assert_eq!(readiness.to_string(), "invalid (Unknown type: pager)");
    }
}
