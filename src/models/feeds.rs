use serde::{Deserialize, Serialize};

/// A read endpoint bound to one slot of the view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedId {
    Health,
    MetricsCurrent,
    MetricsHistory,
    Anomalies,
    Recommendations,
    Cpu,
    Memory,
    Waits,
    Sessions,
    Blocking,
    Queries,
    Io,
    Indexes,
    QueryStore,
    Databases,
    Configuration,
    ActiveDatabase,
    DatabaseList,
}

impl FeedId {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedId::Health => "health",
            FeedId::MetricsCurrent => "metrics-current",
            FeedId::MetricsHistory => "metrics-history",
            FeedId::Anomalies => "anomalies",
            FeedId::Recommendations => "recommendations",
            FeedId::Cpu => "cpu",
            FeedId::Memory => "memory",
            FeedId::Waits => "waits",
            FeedId::Sessions => "sessions",
            FeedId::Blocking => "blocking",
            FeedId::Queries => "queries",
            FeedId::Io => "io",
            FeedId::Indexes => "indexes",
            FeedId::QueryStore => "query-store",
            FeedId::Databases => "databases",
            FeedId::Configuration => "configuration",
            FeedId::ActiveDatabase => "active-database",
            FeedId::DatabaseList => "database-list",
        }
    }
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refresh tier a cadence belongs to. Intervals come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
    Analysis,
    Once,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Warm => "warm",
            Tier::Cold => "cold",
            Tier::Analysis => "analysis",
            Tier::Once => "once",
        }
    }
}

/// A dashboard view. Mounting a page starts its cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    #[default]
    Overview,
    Server,
    Workload,
    Waits,
    Io,
    Indexes,
    QueryStore,
    Databases,
    Configuration,
    Analysis,
    Chat,
}

impl Page {
    /// Cadence tiers for this page and the feeds each one refreshes.
    pub fn schedule(self) -> &'static [(Tier, &'static [FeedId])] {
        use FeedId::*;
        match self {
            Page::Overview => &[
                (Tier::Hot, &[Health, Cpu, Sessions, Waits, Blocking]),
                (Tier::Warm, &[Memory]),
                (Tier::Cold, &[ActiveDatabase, DatabaseList]),
            ],
            Page::Server => &[(Tier::Hot, &[Cpu, Memory])],
            Page::Workload => &[(Tier::Hot, &[Sessions, Blocking, Queries])],
            Page::Waits => &[(Tier::Hot, &[Waits])],
            Page::Io => &[(Tier::Warm, &[Io])],
            Page::Indexes => &[(Tier::Cold, &[Indexes])],
            Page::QueryStore => &[(Tier::Cold, &[QueryStore])],
            Page::Databases => &[(Tier::Cold, &[Databases])],
            Page::Configuration => &[(Tier::Once, &[Configuration])],
            Page::Analysis => &[(
                Tier::Analysis,
                &[MetricsCurrent, MetricsHistory, Anomalies, Recommendations],
            )],
            Page::Chat => &[],
        }
    }

    /// Every feed mounted by this page, in schedule order.
    pub fn feeds(self) -> Vec<FeedId> {
        self.schedule()
            .iter()
            .flat_map(|(_, feeds)| feeds.iter().copied())
            .collect()
    }
}
