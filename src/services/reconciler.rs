use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::domains::{
    BlockingSnapshot, ConfigSnapshot, CpuMetrics, DatabasesSnapshot, DomainEnvelope,
    IndexSnapshot, IoSnapshot, MemoryMetrics, QuerySnapshot, QueryStoreSnapshot, SessionSummary,
    WaitStatsSnapshot,
};
use crate::models::metrics::MetricSnapshot;

/// A payload whose identity is the instant the backend produced it.
pub trait Snapshot {
    fn identity(&self) -> DateTime<Utc>;
}

macro_rules! impl_snapshot {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Snapshot for $ty {
                fn identity(&self) -> DateTime<Utc> {
                    self.timestamp
                }
            }
        )+
    };
}

impl_snapshot!(
    MetricSnapshot,
    CpuMetrics,
    MemoryMetrics,
    WaitStatsSnapshot,
    SessionSummary,
    BlockingSnapshot,
    QuerySnapshot,
    IoSnapshot,
    IndexSnapshot,
    QueryStoreSnapshot,
    DatabasesSnapshot,
    ConfigSnapshot,
);

/// What `DomainState::reconcile` did with an incoming snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconciled {
    /// First snapshot for the domain; `previous` stays unset.
    First,
    /// A distinct snapshot replaced `current`, which moved to `previous`.
    Superseded,
    /// Same identity as `current`; discarded.
    Duplicate,
    /// Older than `current` (a slow response overtaken by a newer one); discarded.
    Stale,
}

impl Reconciled {
    pub fn accepted(self) -> bool {
        matches!(self, Reconciled::First | Reconciled::Superseded)
    }
}

/// `{current, previous, lastRefreshedAt}` for one monitored domain, plus the
/// history series the backend returns alongside `current`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainState<T> {
    current: Option<T>,
    previous: Option<T>,
    history: Vec<T>,
    #[serde(with = "crate::models::timestamp::option")]
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl<T> Default for DomainState<T> {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
            history: Vec::new(),
            last_refreshed_at: None,
        }
    }
}

impl<T> DomainState<T> {
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    pub fn history(&self) -> &[T] {
        &self.history
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed_at
    }
}

impl<T: Snapshot> DomainState<T> {
    /// `previous` takes the old `current` only when a distinct, newer
    /// snapshot arrives. Duplicates and overtaken responses leave both
    /// slots untouched.
    pub fn reconcile(&mut self, incoming: T, now: DateTime<Utc>) -> Reconciled {
        let outcome = match &self.current {
            None => Reconciled::First,
            Some(current) => match incoming.identity().cmp(&current.identity()) {
                Ordering::Greater => Reconciled::Superseded,
                Ordering::Equal => Reconciled::Duplicate,
                Ordering::Less => Reconciled::Stale,
            },
        };

        if outcome.accepted() {
            self.previous = self.current.replace(incoming);
        }
        if outcome != Reconciled::Stale {
            self.last_refreshed_at = Some(now);
        }
        outcome
    }

    /// Reconciles an endpoint envelope. Without `current` the collector is
    /// still warming up and the state is left as is. An accepted envelope
    /// replaces the history series, even with an empty one.
    pub fn reconcile_envelope(
        &mut self,
        envelope: DomainEnvelope<T>,
        now: DateTime<Utc>,
    ) -> Option<Reconciled> {
        let current = envelope.current?;
        let outcome = self.reconcile(current, now);
        if outcome != Reconciled::Stale {
            self.history = envelope.history;
        }
        Some(outcome)
    }
}

/// Holder for feeds without an identity key: the latest value wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Latest<T> {
    value: Option<T>,
    #[serde(with = "crate::models::timestamp::option")]
    refreshed_at: Option<DateTime<Utc>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            value: None,
            refreshed_at: None,
        }
    }
}

impl<T> Latest<T> {
    pub fn replace(&mut self, value: T, now: DateTime<Utc>) {
        self.value = Some(value);
        self.refreshed_at = Some(now);
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Polarity {
    HigherIsWorse,
    HigherIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendQuality {
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// `None` when flat.
    pub quality: Option<TrendQuality>,
}

/// Direction of `curr` against `prev`, classified through `polarity`.
/// Absent `prev` (or an incomparable NaN) is always flat.
pub fn trend(curr: f64, prev: Option<f64>, polarity: Polarity) -> Trend {
    let direction = match prev.and_then(|prev| curr.partial_cmp(&prev)) {
        Some(Ordering::Greater) => TrendDirection::Up,
        Some(Ordering::Less) => TrendDirection::Down,
        Some(Ordering::Equal) | None => TrendDirection::Flat,
    };

    let quality = match (direction, polarity) {
        (TrendDirection::Flat, _) => None,
        (TrendDirection::Up, Polarity::HigherIsWorse)
        | (TrendDirection::Down, Polarity::HigherIsBetter) => Some(TrendQuality::Bad),
        (TrendDirection::Down, Polarity::HigherIsWorse)
        | (TrendDirection::Up, Polarity::HigherIsBetter) => Some(TrendQuality::Good),
    };

    Trend { direction, quality }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        at: DateTime<Utc>,
        value: u32,
    }

    impl Snapshot for Sample {
        fn identity(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn sample(offset_secs: i64, value: u32) -> Sample {
        Sample {
            at: base() + Duration::seconds(offset_secs),
            value,
        }
    }

    #[test]
    fn first_snapshot_leaves_previous_unset() {
        let mut state = DomainState::default();
        assert_eq!(state.reconcile(sample(0, 1), base()), Reconciled::First);
        assert_eq!(state.current().map(|s| s.value), Some(1));
        assert!(state.previous().is_none());
    }

    #[test]
    fn previous_tracks_prior_current_across_sequence() {
        let feed = [
            sample(0, 1),
            sample(5, 2),
            sample(5, 99),
            sample(10, 3),
            sample(10, 3),
            sample(15, 4),
        ];
        let mut state = DomainState::default();
        let mut last_current: Option<Sample> = None;

        for incoming in feed {
            let before_previous = state.previous().cloned();
            let outcome = state.reconcile(incoming, base());
            match outcome {
                Reconciled::Duplicate => {
                    assert_eq!(state.previous().cloned(), before_previous);
                    assert_eq!(state.current().cloned(), last_current);
                }
                _ => assert_eq!(state.previous().cloned(), last_current),
            }
            last_current = state.current().cloned();
        }

        assert_eq!(state.current().map(|s| s.value), Some(4));
        assert_eq!(state.previous().map(|s| s.value), Some(3));
    }

    #[test]
    fn duplicate_keeps_first_payload_for_that_instant() {
        let mut state = DomainState::default();
        state.reconcile(sample(0, 1), base());
        state.reconcile(sample(5, 2), base());
        assert_eq!(state.reconcile(sample(5, 7), base()), Reconciled::Duplicate);
        assert_eq!(state.current().map(|s| s.value), Some(2));
        assert_eq!(state.previous().map(|s| s.value), Some(1));
    }

    #[test]
    fn overtaken_response_is_stale() {
        let mut state = DomainState::default();
        let refreshed = base() + Duration::seconds(11);
        state.reconcile(sample(5, 1), base());
        state.reconcile(sample(10, 2), refreshed);

        assert_eq!(
            state.reconcile(sample(0, 0), base() + Duration::seconds(12)),
            Reconciled::Stale
        );
        assert_eq!(state.current().map(|s| s.value), Some(2));
        assert_eq!(state.previous().map(|s| s.value), Some(1));
        assert_eq!(state.last_refreshed_at(), Some(refreshed));
    }

    #[test]
    fn envelope_without_current_changes_nothing() {
        let mut state: DomainState<Sample> = DomainState::default();
        let outcome = state.reconcile_envelope(DomainEnvelope::new(None, vec![sample(0, 1)]), base());
        assert!(outcome.is_none());
        assert!(state.history().is_empty());
        assert!(state.last_refreshed_at().is_none());
    }

    #[test]
    fn envelope_history_replaces_series() {
        let mut state = DomainState::default();
        let envelope = DomainEnvelope::new(Some(sample(5, 2)), vec![sample(0, 1), sample(5, 2)]);
        assert_eq!(state.reconcile_envelope(envelope, base()), Some(Reconciled::First));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn empty_envelope_history_clears_series() {
        let mut state = DomainState::default();
        let filled = DomainEnvelope::new(Some(sample(5, 2)), vec![sample(0, 1), sample(5, 2)]);
        state.reconcile_envelope(filled, base());

        let emptied = DomainEnvelope::new(Some(sample(10, 3)), Vec::new());
        assert_eq!(state.reconcile_envelope(emptied, base()), Some(Reconciled::Superseded));
        assert!(state.history().is_empty());
        assert_eq!(state.current().map(|s| s.value), Some(3));
    }

    #[test]
    fn stale_envelope_keeps_history() {
        let mut state = DomainState::default();
        let filled = DomainEnvelope::new(Some(sample(5, 2)), vec![sample(0, 1), sample(5, 2)]);
        state.reconcile_envelope(filled, base());

        let overtaken = DomainEnvelope::new(Some(sample(0, 1)), Vec::new());
        assert_eq!(state.reconcile_envelope(overtaken, base()), Some(Reconciled::Stale));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn trend_is_flat_without_previous_or_change() {
        for polarity in [Polarity::HigherIsWorse, Polarity::HigherIsBetter] {
            assert_eq!(trend(5.0, None, polarity).direction, TrendDirection::Flat);
            assert_eq!(trend(5.0, Some(5.0), polarity).direction, TrendDirection::Flat);
            assert_eq!(trend(5.0, Some(5.0), polarity).quality, None);
        }
        assert_eq!(trend(f64::NAN, Some(1.0), Polarity::HigherIsWorse).direction, TrendDirection::Flat);
    }

    #[test]
    fn polarity_maps_direction_to_quality() {
        let rising = trend(8.0, Some(3.0), Polarity::HigherIsWorse);
        assert_eq!(rising.direction, TrendDirection::Up);
        assert_eq!(rising.quality, Some(TrendQuality::Bad));

        let rising_good = trend(8.0, Some(3.0), Polarity::HigherIsBetter);
        assert_eq!(rising_good.quality, Some(TrendQuality::Good));

        let falling = trend(1.0, Some(3.0), Polarity::HigherIsWorse);
        assert_eq!(falling.direction, TrendDirection::Down);
        assert_eq!(falling.quality, Some(TrendQuality::Good));
    }
}
