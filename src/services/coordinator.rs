//! Single-flight coordination for user-triggered mutating actions.
//!
//! Each action class has one in-flight flag. A second request for a busy
//! class is rejected immediately; it is never queued and never retried.
//! The flag is held by a guard, so it is released on success, on failure
//! and when the caller drops the future mid-flight.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::feeds::FeedId;
use crate::services::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionClass {
    Analysis,
    RefreshAll,
    DbSwitch,
}

impl ActionClass {
    pub const ALL: [ActionClass; 3] = [
        ActionClass::Analysis,
        ActionClass::RefreshAll,
        ActionClass::DbSwitch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionClass::Analysis => "analysis",
            ActionClass::RefreshAll => "refreshAll",
            ActionClass::DbSwitch => "dbSwitch",
        }
    }

    /// Read pass owed to the view once this action succeeds.
    pub fn follow_up(self) -> FollowUp {
        match self {
            ActionClass::Analysis => FollowUp::Refetch(&[
                FeedId::Recommendations,
                FeedId::MetricsCurrent,
                FeedId::Anomalies,
            ]),
            ActionClass::RefreshAll => FollowUp::RefetchMounted,
            ActionClass::DbSwitch => FollowUp::ResetAndRefetchMounted,
        }
    }

    fn slot(self) -> usize {
        match self {
            ActionClass::Analysis => 0,
            ActionClass::RefreshAll => 1,
            ActionClass::DbSwitch => 2,
        }
    }
}

impl std::fmt::Display for ActionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Refetch(&'static [FeedId]),
    RefetchMounted,
    /// The active database changed: drop every domain, then refetch.
    ResetAndRefetchMounted,
}

/// Receiver of the single post-action read pass.
#[async_trait]
pub trait Resync: Send + Sync {
    async fn resync(&self, follow_up: FollowUp);
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} is already in progress")]
    Busy(ActionClass),
    #[error("{class} failed: {source}")]
    Failed {
        class: ActionClass,
        #[source]
        source: ApiError,
    },
}

/// In-flight flags per action class, as exposed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    pub analysis: bool,
    pub refresh_all: bool,
    pub db_switch: bool,
}

#[derive(Default)]
pub struct ActionCoordinator {
    in_flight: Mutex<[bool; 3]>,
}

struct InFlight<'a> {
    coordinator: &'a ActionCoordinator,
    class: ActionClass,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.coordinator.in_flight.lock()[self.class.slot()] = false;
    }
}

impl ActionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self, class: ActionClass) -> Result<InFlight<'_>, ActionError> {
        let mut flags = self.in_flight.lock();
        if flags[class.slot()] {
            return Err(ActionError::Busy(class));
        }
        flags[class.slot()] = true;
        Ok(InFlight {
            coordinator: self,
            class,
        })
    }

    pub fn is_in_flight(&self, class: ActionClass) -> bool {
        self.in_flight.lock()[class.slot()]
    }

    pub fn state(&self) -> ActionState {
        let flags = *self.in_flight.lock();
        ActionState {
            analysis: flags[ActionClass::Analysis.slot()],
            refresh_all: flags[ActionClass::RefreshAll.slot()],
            db_switch: flags[ActionClass::DbSwitch.slot()],
        }
    }

    /// Runs `operation` unless `class` is already in flight, then performs
    /// exactly one follow-up read pass on success. The flag stays set until
    /// the follow-up has completed.
    pub async fn run<T, Fut>(
        &self,
        class: ActionClass,
        operation: Fut,
        resync: &dyn Resync,
    ) -> Result<T, ActionError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let _in_flight = self.acquire(class).map_err(|err| {
            info!(action = class.as_str(), "rejected: action already in flight");
            err
        })?;

        match operation.await {
            Ok(value) => {
                resync.resync(class.follow_up()).await;
                Ok(value)
            }
            Err(source) => {
                warn!(action = class.as_str(), error = %source, "action failed");
                Err(ActionError::Failed { class, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<FollowUp>>,
    }

    #[async_trait]
    impl Resync for Recorder {
        async fn resync(&self, follow_up: FollowUp) {
            self.calls.lock().push(follow_up);
        }
    }

    fn http_error() -> ApiError {
        ApiError::Http {
            status: 500,
            body: "analysis crashed".into(),
        }
    }

    #[tokio::test]
    async fn second_run_while_in_flight_is_busy() {
        let coordinator = ActionCoordinator::new();
        let recorder = Recorder::default();
        let (tx, rx) = oneshot::channel::<Result<u32, ApiError>>();

        let mut first = task::spawn(coordinator.run(
            ActionClass::Analysis,
            async move { rx.await.unwrap_or_else(|_| Err(http_error())) },
            &recorder,
        ));
        assert_pending!(first.poll());
        assert!(coordinator.is_in_flight(ActionClass::Analysis));

        let second = coordinator
            .run(ActionClass::Analysis, async { Ok(2) }, &recorder)
            .await;
        assert!(matches!(second, Err(ActionError::Busy(ActionClass::Analysis))));

        tx.send(Ok(1)).unwrap();
        let outcome = assert_ready!(first.poll());
        assert_eq!(outcome.unwrap(), 1);
        assert!(!coordinator.is_in_flight(ActionClass::Analysis));
        assert_eq!(recorder.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn classes_are_independent() {
        let coordinator = ActionCoordinator::new();
        let recorder = Recorder::default();
        let (_tx, rx) = oneshot::channel::<Result<(), ApiError>>();

        let mut analysis = task::spawn(coordinator.run(
            ActionClass::Analysis,
            async move { rx.await.unwrap_or_else(|_| Err(http_error())) },
            &recorder,
        ));
        assert_pending!(analysis.poll());

        let refreshed = coordinator
            .run(ActionClass::RefreshAll, async { Ok(()) }, &recorder)
            .await;
        assert!(refreshed.is_ok());
        assert_eq!(*recorder.calls.lock(), vec![FollowUp::RefetchMounted]);
        assert_eq!(
            coordinator.state(),
            ActionState {
                analysis: true,
                refresh_all: false,
                db_switch: false,
            }
        );
    }

    #[tokio::test]
    async fn failure_releases_flag_without_follow_up() {
        let coordinator = ActionCoordinator::new();
        let recorder = Recorder::default();

        let outcome: Result<(), _> = coordinator
            .run(ActionClass::DbSwitch, async { Err(http_error()) }, &recorder)
            .await;

        match outcome {
            Err(ActionError::Failed { class, source }) => {
                assert_eq!(class, ActionClass::DbSwitch);
                assert!(matches!(source, ApiError::Http { status: 500, .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!coordinator.is_in_flight(ActionClass::DbSwitch));
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn dropping_in_flight_run_releases_flag() {
        let coordinator = ActionCoordinator::new();
        let recorder = Recorder::default();
        let (_tx, rx) = oneshot::channel::<Result<(), ApiError>>();

        let mut pending = task::spawn(coordinator.run(
            ActionClass::RefreshAll,
            async move { rx.await.unwrap_or_else(|_| Err(http_error())) },
            &recorder,
        ));
        assert_pending!(pending.poll());
        assert!(coordinator.is_in_flight(ActionClass::RefreshAll));

        drop(pending);
        assert!(!coordinator.is_in_flight(ActionClass::RefreshAll));
    }

    #[tokio::test]
    async fn db_switch_asks_for_full_reset() {
        let coordinator = ActionCoordinator::new();
        let recorder = Arc::new(Recorder::default());

        coordinator
            .run(ActionClass::DbSwitch, async { Ok(()) }, recorder.as_ref())
            .await
            .unwrap();

        assert_eq!(
            *recorder.calls.lock(),
            vec![FollowUp::ResetAndRefetchMounted]
        );
    }
}
