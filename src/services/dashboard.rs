use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::models::config::{CadenceConfig, HistoryConfig};
use crate::models::domains::{
    ActiveDatabase, BlockingSnapshot, ConfigSnapshot, CpuMetrics, DatabaseList, DatabasesSnapshot,
    IndexSnapshot, IoSnapshot, MemoryMetrics, QuerySnapshot, QueryStoreSnapshot, SessionSummary,
    WaitStatsSnapshot,
};
use crate::models::feeds::{FeedId, Page};
use crate::models::metrics::{Anomaly, HealthCheck, MetricSnapshot};
use crate::models::recommendation::{Recommendation, TriggerAnalysisResponse};
use crate::services::api::{ApiError, DashboardApi};
use crate::services::coordinator::{
    ActionClass, ActionCoordinator, ActionError, ActionState, FollowUp, Resync,
};
use crate::services::reconciler::{DomainState, Latest, Reconciled};
use crate::services::scheduler::{Cadence, CadenceScheduler};
use crate::services::views::{self, Category, MetricCard};

/// Latest and historical recommendations plus the user's selection, keyed
/// by recommendation timestamp.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecommendationBoard {
    latest: Option<Recommendation>,
    history: Vec<Recommendation>,
    #[serde(with = "crate::models::timestamp::option")]
    selected: Option<DateTime<Utc>>,
    #[serde(with = "crate::models::timestamp::option")]
    refreshed_at: Option<DateTime<Utc>>,
}

impl RecommendationBoard {
    pub fn latest(&self) -> Option<&Recommendation> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &[Recommendation] {
        &self.history
    }

    pub fn selected(&self) -> Option<DateTime<Utc>> {
        self.selected
    }

    pub fn set_latest(&mut self, latest: Option<Recommendation>, now: DateTime<Utc>) {
        self.latest = latest;
        self.refreshed_at = Some(now);
    }

    /// A selection that is no longer present anywhere is cleared.
    pub fn set_history(&mut self, history: Vec<Recommendation>, now: DateTime<Utc>) {
        self.history = history;
        self.refreshed_at = Some(now);
        if let Some(selected) = self.selected {
            if self.find(selected).is_none() {
                self.selected = None;
            }
        }
    }

    pub fn select(&mut self, timestamp: DateTime<Utc>) -> bool {
        let found = self.find(timestamp).is_some();
        if found {
            self.selected = Some(timestamp);
        }
        found
    }

    /// The selected recommendation if still present, otherwise the latest.
    pub fn active(&self) -> Option<&Recommendation> {
        self.selected
            .and_then(|ts| self.find(ts))
            .or(self.latest.as_ref())
    }

    fn find(&self, timestamp: DateTime<Utc>) -> Option<&Recommendation> {
        self.history
            .iter()
            .chain(self.latest.as_ref())
            .find(|rec| rec.timestamp == timestamp)
    }
}

/// Everything a mounted view shows. Created empty on mount, reset on a
/// database switch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewState {
    pub health: Latest<HealthCheck>,
    pub metrics: DomainState<MetricSnapshot>,
    pub metrics_history: Latest<Vec<MetricSnapshot>>,
    pub anomalies: Latest<Vec<Anomaly>>,
    pub recommendations: RecommendationBoard,
    pub cpu: DomainState<CpuMetrics>,
    pub memory: DomainState<MemoryMetrics>,
    pub waits: DomainState<WaitStatsSnapshot>,
    pub sessions: DomainState<SessionSummary>,
    pub blocking: DomainState<BlockingSnapshot>,
    pub queries: DomainState<QuerySnapshot>,
    pub io: DomainState<IoSnapshot>,
    pub indexes: DomainState<IndexSnapshot>,
    pub query_store: DomainState<QueryStoreSnapshot>,
    pub databases: DomainState<DatabasesSnapshot>,
    pub configuration: DomainState<ConfigSnapshot>,
    pub active_database: Latest<ActiveDatabase>,
    pub database_list: Latest<DatabaseList>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedAnomaly {
    #[serde(flatten)]
    pub anomaly: Anomaly,
    pub category: Category,
}

/// Derived signals for the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSignals {
    pub system_healthy: bool,
    pub ranked_anomalies: Vec<RankedAnomaly>,
    pub metric_cards: Vec<MetricCard>,
    pub cpu_pressure: Option<Category>,
    pub stale_backups: Vec<String>,
    pub recommendation_risk: Option<Category>,
}

impl ViewState {
    pub fn signals(&self, now: DateTime<Utc>) -> ViewSignals {
        let ranked_anomalies = self
            .anomalies
            .get()
            .map(|anomalies| {
                views::rank_anomalies(anomalies)
                    .into_iter()
                    .map(|anomaly| RankedAnomaly {
                        category: views::severity_category(anomaly.severity),
                        anomaly: anomaly.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        ViewSignals {
            system_healthy: views::is_system_healthy(self.health.get()),
            ranked_anomalies,
            metric_cards: self
                .metrics
                .current()
                .map(|current| views::metric_cards(current, self.metrics.previous()))
                .unwrap_or_default(),
            cpu_pressure: self
                .cpu
                .current()
                .map(|cpu| views::cpu_pressure(cpu.sql_cpu_percent)),
            stale_backups: self
                .databases
                .current()
                .map(|snapshot| {
                    views::stale_backups(&snapshot.databases, now)
                        .into_iter()
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            recommendation_risk: self
                .recommendations
                .active()
                .map(|rec| views::risk_category(&rec.risk_level)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardSettings {
    pub cadences: CadenceConfig,
    pub history: HistoryConfig,
}

/// Snapshot of a view handed to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub page: Page,
    pub live: bool,
    pub cadences: Vec<&'static str>,
    pub actions: ActionState,
    pub state: ViewState,
    pub signals: ViewSignals,
}

/// One mounted page: its cadences, its view state and its action flags.
///
/// Every write checks the liveness flag under the state lock, so a fetch
/// that resolves after `unmount` never touches the state. Writes also carry
/// the state generation seen when their fetch was issued; a reset bumps it,
/// so responses for the previous database are dropped.
pub struct Dashboard {
    page: Page,
    api: Arc<dyn DashboardApi>,
    settings: DashboardSettings,
    state: Mutex<ViewState>,
    live: AtomicBool,
    generation: AtomicU64,
    scheduler: CadenceScheduler,
    actions: ActionCoordinator,
}

impl Dashboard {
    /// A live view with no cadences running.
    pub fn new(page: Page, api: Arc<dyn DashboardApi>, settings: DashboardSettings) -> Arc<Self> {
        Arc::new(Self {
            page,
            api,
            settings,
            state: Mutex::new(ViewState::default()),
            live: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            scheduler: CadenceScheduler::new(),
            actions: ActionCoordinator::new(),
        })
    }

    /// Creates the view and starts one cadence per tier of `page`.
    pub fn mount(page: Page, api: Arc<dyn DashboardApi>, settings: DashboardSettings) -> Arc<Self> {
        let dashboard = Self::new(page, api, settings);
        dashboard.start_cadences();
        info!(page = ?page, cadences = page.schedule().len(), "view mounted");
        dashboard
    }

    fn start_cadences(self: &Arc<Self>) {
        for &(tier, feeds) in self.page.schedule() {
            let cadence = Cadence::from(self.settings.cadences.interval(tier));
            let view = Arc::downgrade(self);
            self.scheduler.start(tier.as_str(), cadence, move || {
                let view = view.clone();
                async move {
                    match view.upgrade() {
                        Some(dashboard) => dashboard.refresh_feeds(feeds).await,
                        None => Ok(()),
                    }
                }
            });
        }
    }

    /// Stops every cadence and turns any in-flight response into a no-op.
    pub fn unmount(&self) {
        self.scheduler.stop_all();
        let _state = self.state.lock();
        if self.live.swap(false, Ordering::SeqCst) {
            info!(page = ?self.page, "view unmounted");
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ViewState {
        self.state.lock().clone()
    }

    pub fn action_state(&self) -> ActionState {
        self.actions.state()
    }

    pub fn view(&self, now: DateTime<Utc>) -> DashboardView {
        let state = self.state();
        DashboardView {
            page: self.page,
            live: self.is_live(),
            cadences: self.scheduler.active(),
            actions: self.actions.state(),
            signals: state.signals(now),
            state,
        }
    }

    /// Refreshes `feeds` concurrently. A failing feed is logged and leaves
    /// its slot untouched; the others are still written.
    pub async fn refresh_feeds(&self, feeds: &[FeedId]) -> anyhow::Result<()> {
        let results = join_all(
            feeds
                .iter()
                .map(|&feed| async move { (feed, self.refresh_feed(feed).await) }),
        )
        .await;

        let failed: Vec<&str> = results
            .iter()
            .filter_map(|(feed, result)| {
                let err = result.as_ref().err()?;
                warn!(feed = feed.as_str(), error = %err, "feed refresh failed");
                Some(feed.as_str())
            })
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} of {} feeds failed: {}",
                failed.len(),
                feeds.len(),
                failed.join(", ")
            ))
        }
    }

    async fn refresh_feed(&self, feed: FeedId) -> Result<(), ApiError> {
        let api = self.api.as_ref();
        match feed {
            FeedId::Health => {
                self.pull(feed, api.health(), |s, v, now| {
                    s.health.replace(v, now);
                    None
                })
                .await
            }
            FeedId::MetricsCurrent => {
                self.pull(feed, api.metrics_current(), |s, v, now| {
                    Some(s.metrics.reconcile(v, now))
                })
                .await
            }
            FeedId::MetricsHistory => {
                let count = self.settings.history.metrics_count;
                self.pull(feed, api.metrics_history(count), |s, v, now| {
                    s.metrics_history.replace(v, now);
                    None
                })
                .await
            }
            FeedId::Anomalies => {
                self.pull(feed, api.anomalies(), |s, v, now| {
                    s.anomalies.replace(v, now);
                    None
                })
                .await
            }
            FeedId::Recommendations => self.refresh_recommendations().await,
            FeedId::Cpu => {
                self.pull(feed, api.cpu(), |s, v, now| s.cpu.reconcile_envelope(v, now))
                    .await
            }
            FeedId::Memory => {
                self.pull(feed, api.memory(), |s, v, now| s.memory.reconcile_envelope(v, now))
                    .await
            }
            FeedId::Waits => {
                self.pull(feed, api.waits(), |s, v, now| s.waits.reconcile_envelope(v, now))
                    .await
            }
            FeedId::Sessions => {
                self.pull(feed, api.sessions(), |s, v, now| {
                    s.sessions.reconcile_envelope(v, now)
                })
                .await
            }
            FeedId::Blocking => {
                self.pull(feed, api.blocking(), |s, v, now| {
                    s.blocking.reconcile_envelope(v, now)
                })
                .await
            }
            FeedId::Queries => {
                self.pull(feed, api.queries(), |s, v, now| s.queries.reconcile_envelope(v, now))
                    .await
            }
            FeedId::Io => {
                self.pull(feed, api.io(), |s, v, now| s.io.reconcile_envelope(v, now))
                    .await
            }
            FeedId::Indexes => {
                self.pull(feed, api.indexes(), |s, v, now| s.indexes.reconcile_envelope(v, now))
                    .await
            }
            FeedId::QueryStore => {
                self.pull(feed, api.query_store(), |s, v, now| {
                    s.query_store.reconcile_envelope(v, now)
                })
                .await
            }
            FeedId::Databases => {
                self.pull(feed, api.databases(), |s, v, now| {
                    s.databases.reconcile_envelope(v, now)
                })
                .await
            }
            FeedId::Configuration => {
                self.pull(feed, api.configuration(), |s, v, now| {
                    s.configuration.reconcile_envelope(v, now)
                })
                .await
            }
            FeedId::ActiveDatabase => {
                self.pull(feed, api.active_database(), |s, v, now| {
                    s.active_database.replace(v, now);
                    None
                })
                .await
            }
            FeedId::DatabaseList => {
                self.pull(feed, api.database_list(), |s, v, now| {
                    s.database_list.replace(v, now);
                    None
                })
                .await
            }
        }
    }

    /// Latest and history are fetched together but written independently.
    async fn refresh_recommendations(&self) -> Result<(), ApiError> {
        let feed = FeedId::Recommendations;
        let limit = self.settings.history.recommendation_limit;
        let generation = self.generation();
        let (latest, history) = futures::join!(
            self.api.latest_recommendation(),
            self.api.recommendation_history(limit)
        );

        let latest = latest.map(|latest| {
            self.apply(feed, generation, |s, now| s.recommendations.set_latest(latest, now));
        });
        let history = history.map(|history| {
            self.apply(feed, generation, |s, now| s.recommendations.set_history(history, now));
        });
        latest.and(history)
    }

    /// Fetch, then write under the liveness check. Errors leave state as is.
    async fn pull<T, Fut, W>(&self, feed: FeedId, fetch: Fut, write: W) -> Result<(), ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
        W: FnOnce(&mut ViewState, T, DateTime<Utc>) -> Option<Reconciled>,
    {
        let generation = self.generation();
        let value = fetch.await?;
        match self.apply(feed, generation, |state, now| write(state, value, now)) {
            Some(Some(Reconciled::Stale)) => {
                debug!(feed = feed.as_str(), "discarded out-of-order snapshot")
            }
            Some(outcome) => trace!(feed = feed.as_str(), outcome = ?outcome, "feed applied"),
            None => {}
        }
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn apply<R>(
        &self,
        feed: FeedId,
        generation: u64,
        write: impl FnOnce(&mut ViewState, DateTime<Utc>) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if !self.live.load(Ordering::SeqCst) {
            debug!(feed = feed.as_str(), "view unmounted, dropping response");
            return None;
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(feed = feed.as_str(), "view state was reset, dropping response");
            return None;
        }
        Some(write(&mut state, Utc::now()))
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        if self.live.load(Ordering::SeqCst) {
            *state = ViewState::default();
            self.generation.fetch_add(1, Ordering::SeqCst);
            info!(page = ?self.page, "view state reset");
        }
    }

    pub fn select_recommendation(&self, timestamp: DateTime<Utc>) -> bool {
        self.apply(FeedId::Recommendations, self.generation(), |s, _| {
            s.recommendations.select(timestamp)
        })
            .unwrap_or(false)
    }

    /// An `error` status in the response is an in-band outcome and is
    /// returned as is.
    pub async fn trigger_analysis(&self) -> Result<TriggerAnalysisResponse, ActionError> {
        let response = self
            .actions
            .run(ActionClass::Analysis, self.api.trigger_analysis(), self)
            .await?;

        if response.is_error() {
            warn!(message = %response.message, "analysis reported an error");
        } else {
            info!(anomalies = response.anomalies_detected, "analysis completed");
        }
        Ok(response)
    }

    pub async fn refresh_all(&self) -> Result<(), ActionError> {
        self.actions
            .run(ActionClass::RefreshAll, self.api.refresh_all(), self)
            .await
    }

    pub async fn switch_database(&self, database: &str) -> Result<(), ActionError> {
        self.actions
            .run(ActionClass::DbSwitch, self.api.switch_database(database), self)
            .await?;
        info!(database, "active database switched");
        Ok(())
    }
}

#[async_trait]
impl Resync for Dashboard {
    async fn resync(&self, follow_up: FollowUp) {
        let feeds = match follow_up {
            FollowUp::Refetch(feeds) => feeds.to_vec(),
            FollowUp::RefetchMounted => self.page.feeds(),
            FollowUp::ResetAndRefetchMounted => {
                self.reset();
                self.page.feeds()
            }
        };

        if let Err(err) = self.refresh_feeds(&feeds).await {
            warn!(page = ?self.page, error = ?err, "follow-up refresh incomplete");
        }
    }
}
