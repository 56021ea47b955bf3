use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::config::ReplicaAddress;

/// Ordering key reported for a replica without samples. It sorts after every
/// measured average, so untried replicas are always tried first.
pub const WORST_LATENCY: Duration = Duration::MAX;

/// Fixed-capacity ring of the most recent samples for one replica.
#[derive(Debug)]
struct LatencyWindow {
    samples: VecDeque<Duration>,
    total: Duration,
    capacity: usize,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            total: Duration::ZERO,
            capacity,
        }
    }

    fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.total = self.total.saturating_sub(oldest);
            }
        }
        self.samples.push_back(sample);
        self.total = self.total.saturating_add(sample);
    }

    fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        Some(self.total / n)
    }
}

/// Snapshot of one replica's latency window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySnapshot {
    /// Number of samples currently in the window.
    pub samples: usize,
    /// Average of those samples, `None` while the window is empty.
    pub average: Option<Duration>,
}

/// Per-replica sliding window of observed response times.
///
/// Shared by every call of one client. All windows sit behind a single mutex
/// that is never held across an await point.
#[derive(Debug)]
pub struct LatencyTracker {
    windows: Mutex<HashMap<ReplicaAddress, LatencyWindow>>,
    window: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::with_window(50)
    }
}

impl LatencyTracker {
    /// Creates a tracker keeping the last `window` samples per replica.
    pub fn with_window(window: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window: window.max(1),
        }
    }

    /// Appends one observed round-trip duration for `replica`.
    pub fn record(&self, replica: &ReplicaAddress, duration: Duration) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .entry(replica.clone())
            .or_insert_with(|| LatencyWindow::new(self.window))
            .push(duration);
    }

    /// Average of the recorded window, or [`WORST_LATENCY`] if there is none.
    pub fn average_or_worst(&self, replica: &ReplicaAddress) -> Duration {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .get(replica)
            .and_then(LatencyWindow::average)
            .unwrap_or(WORST_LATENCY)
    }

    /// Returns `replicas` sorted by ascending average latency.
    ///
    /// The sort is stable, so replicas with equal keys (including all untried
    /// ones) keep their original relative order.
    pub fn order_replicas(&self, replicas: &[ReplicaAddress]) -> Vec<ReplicaAddress> {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ordered: Vec<(Duration, &ReplicaAddress)> = replicas
            .iter()
            .map(|r| {
                let key = windows
                    .get(r)
                    .and_then(LatencyWindow::average)
                    .unwrap_or(WORST_LATENCY);
                (key, r)
            })
            .collect();
        drop(windows);

        ordered.sort_by_key(|(key, _)| *key);
        ordered.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// Returns the current window state for `replica`.
    pub fn snapshot(&self, replica: &ReplicaAddress) -> LatencySnapshot {
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.get(replica) {
            Some(w) => LatencySnapshot {
                samples: w.samples.len(),
                average: w.average(),
            },
            None => LatencySnapshot {
                samples: 0,
                average: None,
            },
        }
    }
}
