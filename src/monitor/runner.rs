//! Per-target check cycle and the concurrent run over all targets.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::policy::should_notify;
use super::prober::HttpProber;
use crate::config::MonitorTarget;
use crate::notifications::models::{PostStatusParam, UnknownNotifierType};
use crate::notifications::service::{NotifierFactory, missing_key, resolve_notifier};
use crate::store::{NOT_FOUND, StatusStore, StoreError};

#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    UnknownNotifierType(#[from] UnknownNotifierType),
    #[error("Failed to read previous status: {0}")]
    ReadStatus(#[source] StoreError),
    #[error("Failed to save current status: {0}")]
    SaveStatus(#[source] StoreError),
    #[error("Check task aborted: {0}")]
    Aborted(String),
}

/// How a completed check cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A required key is missing; nothing was probed or stored.
    Skipped { missing_key: &'static str },
    /// First observation for the target; the status became the baseline.
    Seeded { status_code: i32 },
    Unchanged { before: i32, current: i32 },
    Notified { before: i32, current: i32 },
    /// The change was stored but the notification could not be delivered.
    NotifyFailed { before: i32, current: i32 },
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: Vec<(String, Result<CheckOutcome, CheckError>)>,
}

impl RunSummary {
    pub fn outcome(&self, name: &str) -> Option<&Result<CheckOutcome, CheckError>> {
        self.results
            .iter()
            .find(|(target, _)| target == name)
            .map(|(_, result)| result)
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn notified(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::Notified { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::Skipped { .. }))
    }

    fn count(&self, predicate: impl Fn(&CheckOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| r.as_ref().is_ok_and(&predicate))
            .count()
    }
}

/// Drives check cycles. Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct StatusMonitor {
    prober: HttpProber,
    store: Arc<dyn StatusStore>,
    notifiers: Arc<dyn NotifierFactory>,
}

impl StatusMonitor {
    pub fn new(
        prober: HttpProber,
        store: Arc<dyn StatusStore>,
        notifiers: Arc<dyn NotifierFactory>,
    ) -> Self {
        Self {
            prober,
            store,
            notifiers,
        }
    }

    /// Runs one check cycle for `target`. Every network call gives up at
    /// `deadline`.
    pub async fn check_target(
        &self,
        target: &MonitorTarget,
        deadline: Instant,
    ) -> Result<CheckOutcome, CheckError> {
        let (kind, notifier) = resolve_notifier(self.notifiers.as_ref(), target)?;

        if let Some(key) = missing_key(notifier.as_ref(), target) {
            debug!(notifier = %kind, missing_key = key, "Incomplete monitor config, skipping.");
            return Ok(CheckOutcome::Skipped { missing_key: key });
        }

        let check_url = target.value_or_empty("check_url");
        let started = std::time::Instant::now();
        let probe = self.prober.check(&check_url, deadline).await;
        let response_time = started.elapsed().as_secs_f64();
        let current = probe.status_code;
        let http_error = probe.error.map(|e| e.to_string());

        info!(
            check_url = %check_url,
            status = current,
            response_time,
            error = ?http_error,
            "request finished"
        );

        let before = within(deadline, "reading previous status", self.store.get_status(&target.name))
            .await
            .map_err(CheckError::ReadStatus)?;

        within(deadline, "saving current status", self.store.save_status(&target.name, current))
            .await
            .map_err(CheckError::SaveStatus)?;

        if !should_notify(before, current, target.check_only_top_of_status_code()) {
            if before == NOT_FOUND {
                info!(status = current, "First observation stored as baseline.");
                return Ok(CheckOutcome::Seeded { status_code: current });
            }
            debug!(before, current, "No notable status change.");
            return Ok(CheckOutcome::Unchanged { before, current });
        }

        let param = PostStatusParam {
            check_url,
            before_status_code: before,
            current_status_code: current,
            http_error,
            response_time_seconds: response_time,
        };

        match tokio::time::timeout_at(deadline, notifier.post_status(&param)).await {
            Ok(Ok(())) => {
                info!(notifier = %kind, before, current, "Status change notified.");
                Ok(CheckOutcome::Notified { before, current })
            }
            Ok(Err(e)) => {
                error!(notifier = %kind, error = %e, "failed to notify");
                Ok(CheckOutcome::NotifyFailed { before, current })
            }
            Err(_) => {
                error!(notifier = %kind, "failed to notify: invocation deadline exceeded");
                Ok(CheckOutcome::NotifyFailed { before, current })
            }
        }
    }

    /// Checks every target concurrently and waits for all of them. A failure
    /// or panic in one target's task is recorded and does not affect others.
    pub async fn run_all(&self, targets: Vec<MonitorTarget>, deadline: Instant) -> RunSummary {
        let mut tasks = JoinSet::new();
        let mut names: HashMap<task::Id, (usize, String)> = HashMap::with_capacity(targets.len());
        for (index, target) in targets.into_iter().enumerate() {
            let monitor = self.clone();
            let name = target.name.clone();
            let span = info_span!("check", monitor = %target.name);
            let handle = tasks.spawn(
                async move { monitor.check_target(&target, deadline).await }.instrument(span),
            );
            names.insert(handle.id(), (index, name));
        }

        let mut finished = Vec::with_capacity(names.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_error) => {
                    let id = join_error.id();
                    let name = names.get(&id).map(|(_, name)| name.as_str()).unwrap_or_default();
                    error!(monitor = %name, error = ?join_error, "Check task panicked.");
                    (id, Err(CheckError::Aborted(join_error.to_string())))
                }
            };
            let Some((index, name)) = names.remove(&id) else {
                continue;
            };
            if let Err(e) = &result {
                warn!(monitor = %name, error = %e, "Check failed.");
            }
            finished.push((index, name, result));
        }
        finished.sort_by_key(|(index, _, _)| *index);

        let summary = RunSummary {
            results: finished
                .into_iter()
                .map(|(_, name, result)| (name, result))
                .collect(),
        };

        info!(
            targets = summary.results.len(),
            notified = summary.notified(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "done"
        );
        summary
    }
}

async fn within<T, F>(deadline: Instant, what: &'static str, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    if Instant::now() >= deadline {
        return Err(StoreError::DeadlineExceeded(what));
    }
    match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::DeadlineExceeded(what)),
    }
}
