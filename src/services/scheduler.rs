use anyhow::Result;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How often a cadence fires after its immediate first cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Once,
    Every(Duration),
}

impl From<Option<Duration>> for Cadence {
    fn from(interval: Option<Duration>) -> Self {
        interval.map_or(Cadence::Once, Cadence::Every)
    }
}

/// A running cadence. Stopping it aborts the timer task together with any
/// cycle still in flight.
pub struct CadenceHandle {
    name: &'static str,
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl CadenceHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(cadence = self.name, "stopping cadence");
        }
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for CadenceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the cadences of one mounted view.
///
/// Cycles of the same cadence may overlap: every tick spawns a new cycle
/// whether or not the previous one has settled.
#[derive(Default)]
pub struct CadenceScheduler {
    handles: Mutex<Vec<CadenceHandle>>,
}

impl CadenceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<F, Fut>(&self, name: &'static str, cadence: Cadence, cycle: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let stopped = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(drive(name, cadence, Arc::new(cycle), Arc::clone(&stopped)));

        self.handles.lock().push(CadenceHandle {
            name,
            stopped,
            task,
        });
    }

    /// Stops every cadence. No cycle starts after this returns.
    pub fn stop_all(&self) {
        let handles: Vec<CadenceHandle> = self.handles.lock().drain(..).collect();
        for handle in &handles {
            handle.stop();
        }
        if !handles.is_empty() {
            info!(count = handles.len(), "stopped cadences");
        }
    }

    pub fn active(&self) -> Vec<&'static str> {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_stopped())
            .map(CadenceHandle::name)
            .collect()
    }
}

async fn drive<F, Fut>(name: &'static str, cadence: Cadence, cycle: Arc<F>, stopped: Arc<AtomicBool>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let period = match cadence {
        Cadence::Once => {
            info!(cadence = name, "running one-shot cadence");
            run_cycle(name, &stopped, cycle.as_ref()).await;
            return;
        }
        Cadence::Every(period) => period,
    };

    info!(cadence = name, interval = ?period, "starting cadence");

    // First tick completes immediately.
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycles = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let cycle = Arc::clone(&cycle);
                let stopped = Arc::clone(&stopped);
                cycles.spawn(async move { run_cycle(name, &stopped, cycle.as_ref()).await });
            }
            Some(joined) = cycles.join_next() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        error!(cadence = name, error = %err, "cadence cycle panicked");
                    }
                }
            }
        }
    }
}

async fn run_cycle<F, Fut>(name: &'static str, stopped: &AtomicBool, cycle: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if stopped.load(Ordering::SeqCst) {
        return;
    }

    let start = Instant::now();
    match cycle().await {
        Ok(()) => debug!(cadence = name, elapsed = ?start.elapsed(), "cadence cycle completed"),
        Err(err) => warn!(cadence = name, error = ?err, "cadence cycle failed"),
    }
}
