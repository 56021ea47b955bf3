//! Races the three dispatch strategies against simulated replicas.
//!
//! Each replica has a typical latency plus an occasional long stall, and one of
//! them fails a share of its calls. The demo fires the same number of calls
//! through every strategy and prints success rate, mean and worst latency, and
//! how many transport calls each strategy spent.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use futures::{future::BoxFuture, FutureExt};
use replica_dispatch::{
    ClusterClient, DispatchConfig, ReplicaAddress, ReplicaSet, Strategy, Transport, TransportError,
};
use tokio::{sync::Semaphore, time};

const NUM_CALLS: usize = 2_000;
const MAX_IN_FLIGHT: usize = 64;
const TIMEOUT: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy)]
struct Profile {
    typical: Duration,
    stall: Duration,
    /// One call in `stall_every` stalls.
    stall_every: u64,
    /// One call in `fail_every` fails; 0 never fails.
    fail_every: u64,
}

/// In-process stand-in for a pool of HTTP replicas.
struct SimulatedCluster {
    profiles: HashMap<ReplicaAddress, Profile>,
    seq: AtomicU64,
    sent: Arc<AtomicUsize>,
}

impl Transport for SimulatedCluster {
    type Response = String;

    fn send(
        &self,
        replica: &ReplicaAddress,
        query: &str,
    ) -> BoxFuture<'static, Result<String, TransportError>> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let profile = self.profiles[replica];
        let body = format!("{replica} answered {query}");

        // Cheap deterministic jitter so runs are comparable.
        let jitter = Duration::from_millis(n.wrapping_mul(2_654_435_761) % 7);
        let stalled = n % profile.stall_every == 0;
        let fails = profile.fail_every != 0 && n % profile.fail_every == 0;

        async move {
            let delay = if stalled { profile.stall } else { profile.typical } + jitter;
            time::sleep(delay).await;
            if fails {
                Err(TransportError::Other("simulated failure".to_string()))
            } else {
                Ok(body)
            }
        }
        .boxed()
    }
}

#[derive(Debug, Default)]
struct Summary {
    ok: usize,
    errors: usize,
    total: Duration,
    worst: Duration,
}

async fn run(strategy: Strategy) -> Result<(Summary, usize), Box<dyn std::error::Error>> {
    let profiles: HashMap<ReplicaAddress, Profile> = [
        ("replica-a", Profile { typical: ms(15), stall: ms(300), stall_every: 20, fail_every: 0 }),
        ("replica-b", Profile { typical: ms(25), stall: ms(150), stall_every: 10, fail_every: 0 }),
        ("replica-c", Profile { typical: ms(10), stall: ms(80), stall_every: 5, fail_every: 4 }),
    ]
    .into_iter()
    .map(|(name, p)| (ReplicaAddress::from(name), p))
    .collect();

    let replicas = ReplicaSet::new(["replica-a", "replica-b", "replica-c"])?;
    let sent = Arc::new(AtomicUsize::new(0));
    let cluster = SimulatedCluster {
        profiles,
        seq: AtomicU64::new(1),
        sent: sent.clone(),
    };
    let cfg = DispatchConfig {
        strategy,
        timeout: TIMEOUT,
        ..DispatchConfig::default()
    };
    let client = ClusterClient::new(replicas, cluster, cfg);
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

    let mut handles = Vec::with_capacity(NUM_CALLS);
    for i in 0..NUM_CALLS {
        let client = client.clone();
        let sem = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore closed");
            let start = Instant::now();
            let res = client.process_request(&format!("key-{i}"), TIMEOUT).await;
            (res.is_ok(), start.elapsed())
        }));
    }

    let mut summary = Summary::default();
    for handle in handles {
        let (ok, latency) = handle.await?;
        if ok {
            summary.ok += 1;
            summary.total += latency;
            summary.worst = summary.worst.max(latency);
        } else {
            summary.errors += 1;
        }
    }

    let stats = client.replica_stats();
    let mut names: Vec<_> = stats.keys().cloned().collect();
    names.sort();
    for name in names {
        let s = &stats[&name];
        println!(
            "  {:>10}: sent = {:5}, wins = {:5}, errors = {:4}, avg = {:6.1} ms",
            name.as_str(),
            s.attempts,
            s.wins,
            s.errors,
            s.avg_latency_ms
        );
    }

    Ok((summary, sent.load(Ordering::Relaxed)))
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    for strategy in Strategy::ALL {
        println!("\n=== {strategy} ===");
        let (summary, sent) = run(strategy).await?;
        let mean_ms = if summary.ok > 0 {
            summary.total.as_secs_f64() * 1000.0 / summary.ok as f64
        } else {
            0.0
        };

        println!("calls                : {NUM_CALLS}");
        println!("transport calls      : {sent}");
        println!("successes            : {}", summary.ok);
        println!("errors (any kind)    : {}", summary.errors);
        println!("mean latency         : {mean_ms:.1} ms");
        println!("worst latency        : {:.1} ms", summary.worst.as_secs_f64() * 1000.0);
    }

    Ok(())
}
