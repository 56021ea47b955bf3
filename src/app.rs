//! Dashboard state: what the next call looks like and how past calls ended.

use std::{collections::HashMap, time::Duration};

use replica_dispatch::{
    ClusterClient, HttpTransport, ReplicaAddress, ReplicaStatsSnapshot, Strategy,
};

use crate::env::Settings;

const TIMEOUT_STEP: Duration = Duration::from_millis(50);
const MIN_TIMEOUT: Duration = Duration::from_millis(50);
const MAX_TIMEOUT: Duration = Duration::from_secs(10);

const BATCH_STEP: usize = 10;
const MAX_BATCH: usize = 1000;
/// Batch calls allowed in flight at once.
pub const MAX_BATCH_IN_FLIGHT: usize = 8;

/// How the next call is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Dispatch across the whole replica set.
    Dispatch(Strategy),
    /// Straight to the selected replica, bypassing the dispatcher.
    Direct,
}

impl Mode {
    /// Order used by the mode switch and the results table.
    pub const CYCLE: [Mode; 4] = [
        Mode::Dispatch(Strategy::Broadcast),
        Mode::Dispatch(Strategy::Sequential),
        Mode::Dispatch(Strategy::Hedged),
        Mode::Direct,
    ];

    pub fn strategy(self) -> Option<Strategy> {
        match self {
            Mode::Dispatch(strategy) => Some(strategy),
            Mode::Direct => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Dispatch(strategy) => strategy.as_str(),
            Mode::Direct => "direct",
        }
    }

    fn next(self) -> Mode {
        let idx = Self::CYCLE.iter().position(|m| *m == self).unwrap_or(0);
        Self::CYCLE[(idx + 1) % Self::CYCLE.len()]
    }
}

/// How a finished call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Served {
        replica: ReplicaAddress,
        preview: String,
    },
    DeadlineExceeded,
    AllFailed {
        cause: String,
    },
    /// A direct call that the replica rejected.
    ReplicaError {
        replica: ReplicaAddress,
        cause: String,
    },
}

/// A finished call, reported by the task that ran it.
#[derive(Debug, Clone)]
pub struct Finished {
    pub mode: Mode,
    pub elapsed: Duration,
    pub verdict: Verdict,
    pub batch: bool,
}

#[derive(Debug)]
pub enum AppEvent {
    Finished(Finished),
}

/// Running totals for one mode.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Tally {
    pub calls: u64,
    pub served: u64,
    pub timeouts: u64,
    pub failures: u64,
    total_served: Duration,
    pub worst: Duration,
}

impl Tally {
    fn record(&mut self, elapsed: Duration, verdict: &Verdict) {
        self.calls += 1;
        match verdict {
            Verdict::Served { .. } => {
                self.served += 1;
                self.total_served += elapsed;
                self.worst = self.worst.max(elapsed);
            }
            Verdict::DeadlineExceeded => self.timeouts += 1,
            Verdict::AllFailed { .. } | Verdict::ReplicaError { .. } => self.failures += 1,
        }
    }

    /// Mean latency of served calls.
    pub fn mean(&self) -> Option<Duration> {
        u32::try_from(self.served)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.total_served / n)
    }

    pub fn served_pct(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.served as f64 * 100.0 / self.calls as f64
        }
    }
}

/// Progress of a batch run.
///
/// `issued` moves when a call is spawned and `finished` when its result comes
/// back, so slow calls never cause the batch to overshoot its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub size: usize,
    pub issued: usize,
    pub finished: usize,
}

impl Batch {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            issued: 0,
            finished: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.issued - self.finished
    }

    /// Claims the next call of the batch if one is left and there is room in flight.
    pub fn take_slot(&mut self) -> bool {
        if self.issued < self.size && self.in_flight() < MAX_BATCH_IN_FLIGHT {
            self.issued += 1;
            true
        } else {
            false
        }
    }

    pub fn complete_one(&mut self) {
        if self.finished < self.issued {
            self.finished += 1;
        }
    }

    pub fn is_done(&self) -> bool {
        self.finished >= self.size
    }

    pub fn percent(&self) -> u16 {
        if self.size == 0 {
            100
        } else {
            (self.finished * 100 / self.size) as u16
        }
    }
}

pub struct App {
    pub client: ClusterClient<HttpTransport>,
    pub replicas: Vec<ReplicaAddress>,
    pub selected: usize,
    pub mode: Mode,
    pub query: String,
    pub timeout: Duration,
    pub batch_size: usize,
    pub batch: Option<Batch>,
    pub tallies: HashMap<Mode, Tally>,
    pub last: Option<Finished>,
    pub stats: HashMap<ReplicaAddress, ReplicaStatsSnapshot>,
    /// Replica order the next sequential or hedged call would use.
    pub order: Vec<ReplicaAddress>,
    pub status: String,
}

impl App {
    pub fn new(client: ClusterClient<HttpTransport>, settings: Settings) -> Self {
        let replicas = settings.replicas.to_vec();
        let mut app = Self {
            client,
            order: replicas.clone(),
            replicas,
            selected: 0,
            mode: Mode::Dispatch(settings.strategy),
            query: settings.query,
            timeout: settings.timeout,
            batch_size: 10,
            batch: None,
            tallies: HashMap::new(),
            last: None,
            stats: HashMap::new(),
            status: "Ready. Enter runs a call, b starts a batch".to_string(),
        };
        app.refresh_stats();
        app
    }

    pub fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.replicas.len().max(1);
    }

    pub fn select_prev(&mut self) {
        let len = self.replicas.len().max(1);
        self.selected = (self.selected + len - 1) % len;
    }

    pub fn selected_replica(&self) -> Option<ReplicaAddress> {
        self.replicas.get(self.selected).cloned()
    }

    pub fn cycle_mode(&mut self) {
        self.mode = self.mode.next();
    }

    pub fn adjust_timeout(&mut self, longer: bool) {
        self.timeout = if longer {
            (self.timeout + TIMEOUT_STEP).min(MAX_TIMEOUT)
        } else {
            self.timeout.saturating_sub(TIMEOUT_STEP).max(MIN_TIMEOUT)
        };
    }

    pub fn adjust_batch_size(&mut self, larger: bool) {
        self.batch_size = if larger {
            (self.batch_size + BATCH_STEP).min(MAX_BATCH)
        } else {
            self.batch_size.saturating_sub(BATCH_STEP).max(BATCH_STEP)
        };
    }

    /// Starts a batch of `batch_size` calls in the current mode, or stops the
    /// running one. Calls already in flight still report back.
    pub fn toggle_batch(&mut self) {
        self.batch = match self.batch {
            Some(batch) => {
                self.status = format!("Batch stopped after {} calls", batch.finished);
                None
            }
            None => {
                self.status = format!("Batch of {} {} calls", self.batch_size, self.mode.label());
                Some(Batch::new(self.batch_size))
            }
        };
    }

    /// Whether another batch call should be spawned now.
    pub fn next_batch_call(&mut self) -> bool {
        self.batch.as_mut().is_some_and(Batch::take_slot)
    }

    /// Part of the timeout each replica gets before the next one is tried.
    pub fn part_budget(&self) -> Duration {
        let n = u32::try_from(self.replicas.len().max(1)).unwrap_or(u32::MAX);
        self.timeout / n
    }

    pub fn tally(&self, mode: Mode) -> Tally {
        self.tallies.get(&mode).copied().unwrap_or_default()
    }

    pub fn clear_tallies(&mut self) {
        self.tallies.clear();
        self.last = None;
        self.status = "Results cleared; latency history kept".to_string();
    }

    /// 1-based position of `replica` in the current latency order.
    pub fn rank_of(&self, replica: &ReplicaAddress) -> Option<usize> {
        self.order.iter().position(|r| r == replica).map(|i| i + 1)
    }

    pub fn refresh_stats(&mut self) {
        self.stats = self.client.replica_stats();
        self.order = self.client.latency().order_replicas(&self.replicas);
    }

    pub fn finish(&mut self, done: Finished) {
        self.tallies
            .entry(done.mode)
            .or_default()
            .record(done.elapsed, &done.verdict);

        if done.batch {
            if let Some(batch) = self.batch.as_mut() {
                batch.complete_one();
                if batch.is_done() {
                    self.status = format!("Batch of {} finished", batch.size);
                    self.batch = None;
                }
            }
        }

        self.last = Some(done);
        self.refresh_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn batch_never_issues_more_than_its_size() {
        let mut batch = Batch::new(10);

        // Nothing finishes: only the in-flight cap worth of calls go out.
        let first_wave = std::iter::from_fn(|| batch.take_slot().then_some(())).count();
        assert_eq!(first_wave, MAX_BATCH_IN_FLIGHT);
        assert!(!batch.take_slot());

        for _ in 0..first_wave {
            batch.complete_one();
        }
        let second_wave = std::iter::from_fn(|| batch.take_slot().then_some(())).count();
        assert_eq!(second_wave, 10 - MAX_BATCH_IN_FLIGHT);
        assert_eq!(batch.issued, 10);
        assert!(!batch.take_slot());
        assert!(!batch.is_done());

        for _ in 0..second_wave {
            batch.complete_one();
        }
        assert!(batch.is_done());
        assert_eq!(batch.percent(), 100);
    }

    #[test]
    fn stray_completions_do_not_run_ahead() {
        let mut batch = Batch::new(3);
        batch.complete_one();
        assert_eq!(batch.finished, 0);
        assert!(batch.take_slot());
        batch.complete_one();
        batch.complete_one();
        assert_eq!(batch.finished, 1);
    }

    #[test]
    fn tally_splits_outcomes() {
        let mut tally = Tally::default();
        let served = Verdict::Served {
            replica: "a".into(),
            preview: String::new(),
        };
        tally.record(ms(10), &served);
        tally.record(ms(30), &served);
        tally.record(ms(500), &Verdict::DeadlineExceeded);
        tally.record(
            ms(5),
            &Verdict::AllFailed {
                cause: "down".into(),
            },
        );

        assert_eq!(tally.calls, 4);
        assert_eq!(tally.served, 2);
        assert_eq!(tally.timeouts, 1);
        assert_eq!(tally.failures, 1);
        assert_eq!(tally.mean(), Some(ms(20)));
        assert_eq!(tally.worst, ms(30));
        assert_eq!(tally.served_pct(), 50.0);
        assert_eq!(Tally::default().mean(), None);
    }

    #[test]
    fn mode_cycle_visits_every_mode() {
        let mut mode = Mode::Direct;
        let mut seen = Vec::new();
        for _ in 0..Mode::CYCLE.len() {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(seen, Mode::CYCLE);
    }
}
