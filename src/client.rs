use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use crate::{
    config::{DispatchConfig, ReplicaAddress, ReplicaSet, Strategy},
    errors::{DispatchError, ReplicaFailure, TransportError},
    latency::LatencyTracker,
    racer::DeadlineRacer,
    strategy,
    transport::{HttpTransport, Transport},
};

#[derive(Debug, Default)]
struct ReplicaStats {
    attempts: u64,
    wins: u64,
    errors: u64,
}

/// Snapshot of replica performance statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaStatsSnapshot {
    /// Number of attempts sent to this replica, including ones that lost.
    pub attempts: u64,
    /// Number of calls this replica answered first.
    pub wins: u64,
    /// Number of attempts that failed or ran out of time.
    pub errors: u64,
    /// Average of the recent latency window in milliseconds, 0 if untried.
    pub avg_latency_ms: f64,
    /// Number of samples in the latency window.
    pub samples: usize,
}

/// One in-flight call to one replica.
#[derive(Debug, Clone)]
pub(crate) struct Attempt {
    pub replica: ReplicaAddress,
    pub started: Instant,
}

pub(crate) type Race<R> = DeadlineRacer<Attempt, R, TransportError>;

/// Stand-in deadline for timeouts too large to add to an `Instant`, roughly
/// 30 years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Parameters of one dispatched call, shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call<'a> {
    pub query: &'a str,
    pub timeout: Duration,
    pub deadline: Instant,
}

impl<'a> Call<'a> {
    pub fn new(query: &'a str, timeout: Duration, start: Instant) -> Self {
        let deadline = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + FAR_FUTURE);
        Self {
            query,
            timeout,
            deadline,
        }
    }

    /// Whether the global deadline has passed. Checked before any other
    /// terminal condition.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// End of a `budget` slice starting now, never past the global deadline.
    pub fn slice_end(&self, budget: Duration) -> Instant {
        Instant::now()
            .checked_add(budget)
            .map_or(self.deadline, |end| end.min(self.deadline))
    }

    /// Equal share of the total timeout for each of `replicas`.
    pub fn part_budget(&self, replicas: usize) -> Duration {
        let n = u32::try_from(replicas.max(1)).unwrap_or(u32::MAX);
        self.timeout / n
    }
}

/// Dispatches queries across a fixed set of interchangeable replicas.
///
/// The client is a cheap-clone handle: clones share the replica set, the
/// transport, and the latency history used to order replicas.
pub struct ClusterClient<T> {
    replicas: ReplicaSet,
    transport: Arc<T>,
    cfg: DispatchConfig,
    latency: Arc<LatencyTracker>,
    stats: Arc<Mutex<HashMap<ReplicaAddress, ReplicaStats>>>,
}

impl<T> Clone for ClusterClient<T> {
    fn clone(&self) -> Self {
        Self {
            replicas: self.replicas.clone(),
            transport: self.transport.clone(),
            cfg: self.cfg.clone(),
            latency: self.latency.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl ClusterClient<HttpTransport> {
    /// Creates a client that reaches replicas over HTTP.
    ///
    /// # Example
    /// ```no_run
    /// use replica_dispatch::{ClusterClient, DispatchConfig, ReplicaSet};
    ///
    /// let replicas = ReplicaSet::new(["http://10.0.0.1:8080/", "http://10.0.0.2:8080/"])?;
    /// let client = ClusterClient::http(replicas, DispatchConfig::conservative());
    /// # Ok::<(), replica_dispatch::DispatchError>(())
    /// ```
    pub fn http(replicas: ReplicaSet, cfg: DispatchConfig) -> Self {
        Self::new(replicas, HttpTransport::default(), cfg)
    }
}

impl<T: Transport> ClusterClient<T> {
    /// Creates a new client over `transport`.
    pub fn new(replicas: ReplicaSet, transport: T, cfg: DispatchConfig) -> Self {
        let mut stats_map = HashMap::new();
        for replica in replicas.iter() {
            stats_map.insert(replica.clone(), ReplicaStats::default());
        }

        Self {
            replicas,
            transport: Arc::new(transport),
            latency: Arc::new(LatencyTracker::with_window(cfg.latency_window)),
            cfg,
            stats: Arc::new(Mutex::new(stats_map)),
        }
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.cfg
    }

    /// Transport shared by every strategy; calls made through it directly are
    /// not counted in [`replica_stats`](Self::replica_stats).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Latency history used to order replicas.
    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// Returns a snapshot of accumulated statistics for each replica.
    pub fn replica_stats(&self) -> HashMap<ReplicaAddress, ReplicaStatsSnapshot> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);

        stats
            .iter()
            .map(|(replica, s)| {
                let window = self.latency.snapshot(replica);
                let avg = window
                    .average
                    .map(|d| d.as_secs_f64() * 1000.0)
                    .unwrap_or(0.0);

                (
                    replica.clone(),
                    ReplicaStatsSnapshot {
                        attempts: s.attempts,
                        wins: s.wins,
                        errors: s.errors,
                        avg_latency_ms: avg,
                        samples: window.samples,
                    },
                )
            })
            .collect()
    }

    /// Sends `query` using the configured strategy and returns the first
    /// successful payload.
    ///
    /// `timeout` is the hard budget for the whole call, counted from entry.
    pub async fn process_request(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<T::Response, DispatchError> {
        let (_replica, resp) = self.dispatch(self.cfg.strategy, query, timeout).await?;
        Ok(resp)
    }

    /// Sends `query` using `strategy`, returning the payload along with the
    /// replica that produced it.
    pub async fn dispatch(
        &self,
        strategy: Strategy,
        query: &str,
        timeout: Duration,
    ) -> Result<(ReplicaAddress, T::Response), DispatchError> {
        let start = Instant::now();
        let call = Call::new(query, timeout, start);

        let result = if timeout.is_zero() {
            Err(DispatchError::DeadlineExceeded(timeout))
        } else {
            match strategy {
                Strategy::Broadcast => strategy::broadcast::dispatch(self, call).await,
                Strategy::Sequential => strategy::sequential::dispatch(self, call).await,
                Strategy::Hedged => strategy::hedged::dispatch(self, call).await,
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok((replica, _)) => {
                tracing::debug!(%strategy, %replica, elapsed_ms, "request served");
            }
            Err(e) => {
                tracing::warn!(%strategy, elapsed_ms, error = %e, "request failed");
            }
        }
        result
    }

    /// Replicas ordered fastest first by recent latency.
    pub(crate) fn ordered_replicas(&self) -> Vec<ReplicaAddress> {
        self.latency.order_replicas(&self.replicas)
    }

    /// Starts an attempt against `replica` and adds it to `race`.
    pub(crate) fn issue(&self, race: &mut Race<T::Response>, replica: &ReplicaAddress, query: &str) {
        tracing::debug!(%replica, query, "sending attempt");
        self.with_stats(replica, |s| s.attempts += 1);
        let op = self.transport.send(replica, query);
        race.push(
            Attempt {
                replica: replica.clone(),
                started: Instant::now(),
            },
            op,
        );
    }

    /// Records the winning attempt's latency and credits the replica.
    pub(crate) fn on_success(&self, attempt: &Attempt) {
        let latency = attempt.started.elapsed();
        self.latency.record(&attempt.replica, latency);

        self.with_stats(&attempt.replica, |s| s.wins += 1);
    }

    /// Absorbs a failed attempt, returning it as a [`ReplicaFailure`].
    pub(crate) fn on_failure(&self, attempt: Attempt, source: TransportError) -> ReplicaFailure {
        tracing::debug!(
            replica = %attempt.replica,
            elapsed_ms = attempt.started.elapsed().as_secs_f64() * 1000.0,
            error = %source,
            "attempt failed"
        );
        self.with_stats(&attempt.replica, |s| s.errors += 1);

        ReplicaFailure {
            replica: attempt.replica,
            source,
        }
    }

    /// Stops waiting on an attempt that ran out of its time slice.
    pub(crate) fn on_slow(&self, attempt: &Attempt) {
        tracing::debug!(
            replica = %attempt.replica,
            elapsed_ms = attempt.started.elapsed().as_secs_f64() * 1000.0,
            "attempt ran out of time"
        );
        self.with_stats(&attempt.replica, |s| s.errors += 1);
    }

    /// Drops every attempt still in `race`. With `timed_out` set the replicas
    /// are charged an error, otherwise they simply lost to another replica.
    pub(crate) fn abandon(&self, race: &mut Race<T::Response>, timed_out: bool) {
        for attempt in race.abandon_all() {
            if timed_out {
                self.on_slow(&attempt);
            } else {
                tracing::trace!(replica = %attempt.replica, "attempt abandoned");
            }
        }
    }

    fn with_stats(&self, replica: &ReplicaAddress, update: impl FnOnce(&mut ReplicaStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = stats.get_mut(replica) {
            update(entry);
        }
    }
}
