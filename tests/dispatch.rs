use std::{error::Error as _, time::Duration};

use futures::future;
use replica_dispatch::{
    ClusterClient, DispatchConfig, DispatchError, ReplicaSet, Strategy,
};
use tokio::time::Instant;

mod common;
use common::*;

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn every_strategy_skips_a_failing_replica() {
    for strategy in Strategy::ALL {
        let (client, _transport) = scripted_client(&[("a", fail(0)), ("b", respond(10, "b"))]);

        let start = Instant::now();
        let (winner, body) = client
            .dispatch(strategy, "q", ms(1000))
            .await
            .unwrap_or_else(|e| panic!("{strategy}: {e}"));

        assert_eq!(winner.as_str(), "b", "{strategy}");
        assert_eq!(body, "b:q", "{strategy}");
        assert_near(start.elapsed(), ms(10));
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn single_replica_behaves_the_same_everywhere() {
    for strategy in Strategy::ALL {
        let (client, _transport) = scripted_client(&[("only", respond(40, "only"))]);
        let start = Instant::now();
        let (winner, _) = client
            .dispatch(strategy, "q", ms(100))
            .await
            .unwrap_or_else(|e| panic!("{strategy}: {e}"));
        assert_eq!(winner.as_str(), "only");
        assert_near(start.elapsed(), ms(40));

        let (client, _transport) = scripted_client(&[("only", Behavior::Hang)]);
        let start = Instant::now();
        let err = client
            .dispatch(strategy, "q", ms(100))
            .await
            .expect_err("the only replica hangs");
        assert!(
            matches!(err, DispatchError::DeadlineExceeded(_)),
            "{strategy}: {err:?}"
        );
        assert_near(start.elapsed(), ms(100));
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn no_call_outlives_its_timeout() {
    let scenarios: Vec<Vec<(&str, Behavior)>> = vec![
        vec![("a", Behavior::Hang), ("b", Behavior::Hang), ("c", Behavior::Hang)],
        vec![("a", respond(400, "a")), ("b", respond(350, "b")), ("c", Behavior::Hang)],
        vec![("a", fail(90)), ("b", Behavior::Hang), ("c", fail(299))],
        vec![("a", respond(299, "a")), ("b", fail(1)), ("c", respond(301, "c"))],
    ];

    for strategy in Strategy::ALL {
        for behaviors in &scenarios {
            let (client, _transport) = scripted_client(behaviors);
            let start = Instant::now();
            let _ = client.dispatch(strategy, "q", ms(300)).await;
            let elapsed = start.elapsed();
            assert!(
                elapsed <= ms(301),
                "{strategy} took {elapsed:?} with {behaviors:?}"
            );
        }
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn zero_timeout_sends_nothing() {
    for strategy in Strategy::ALL {
        let (client, transport) = scripted_client(&[("a", respond(0, "a"))]);
        let err = client
            .dispatch(strategy, "q", ms(0))
            .await
            .expect_err("no time to send anything");
        assert!(matches!(err, DispatchError::DeadlineExceeded(_)));
        assert!(transport.sent().is_empty());
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn replica_order_adapts_to_observed_latency() {
    let transport = ScriptedTransport::new(&[("a", respond(80, "a")), ("b", respond(10, "b"))]);
    let replicas = ReplicaSet::new(["a", "b"]).unwrap();
    let client = ClusterClient::new(replicas, transport.clone(), DispatchConfig::conservative());

    for _ in 0..3 {
        client
            .process_request("q", ms(1000))
            .await
            .expect("a replica answers");
    }

    // a and b are each tried once while untried, then b is known to be faster.
    assert_eq!(transport.sent_replicas(), ["a", "b", "b"]);

    let stats = client.replica_stats();
    assert_eq!(stats[&addr("a")].wins, 1);
    assert_eq!(stats[&addr("b")].wins, 2);
    assert_eq!(stats[&addr("b")].samples, 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn concurrent_calls_are_independent() {
    let (client, _transport) = scripted_client(&[
        ("a", respond(30, "a")),
        ("b", respond(20, "b")),
        ("c", fail(5)),
    ]);

    let calls = (0..20).map(|i| {
        let client = client.clone();
        let strategy = Strategy::ALL[i % 3];
        async move { client.dispatch(strategy, "q", ms(500)).await }
    });
    let results = future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok), "{results:?}");
    let wins: u64 = client.replica_stats().values().map(|s| s.wins).sum();
    assert_eq!(wins, 20);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn all_replicas_failed_keeps_the_cause() {
    let (client, _transport) = scripted_client(&[("a", fail(1))]);

    let err = client
        .dispatch(Strategy::Broadcast, "q", ms(100))
        .await
        .expect_err("a fails");

    assert_eq!(err.to_string(), "all replicas failed");
    let failure = err.source().expect("replica failure");
    assert_eq!(failure.to_string(), "replica a failed");
    let cause = failure.source().expect("transport error");
    assert_eq!(cause.to_string(), "a is down");
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unbounded_timeout_is_accepted() {
    for strategy in Strategy::ALL {
        let (client, _transport) = scripted_client(&[("a", respond(5, "a"))]);
        let start = Instant::now();
        let (winner, _) = client
            .dispatch(strategy, "q", Duration::MAX)
            .await
            .unwrap_or_else(|e| panic!("{strategy}: {e}"));
        assert_eq!(winner.as_str(), "a");
        assert_near(start.elapsed(), ms(5));

        let (client, _transport) = scripted_client(&[("a", fail(1)), ("b", respond(5, "b"))]);
        let (winner, _) = client
            .dispatch(strategy, "q", Duration::MAX)
            .await
            .unwrap_or_else(|e| panic!("{strategy}: {e}"));
        assert_eq!(winner.as_str(), "b", "{strategy}");
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn deadline_wins_over_failures_landing_on_it() {
    for strategy in Strategy::ALL {
        let (client, _transport) = scripted_client(&[("a", fail(100)), ("b", fail(100))]);
        let start = Instant::now();
        let err = client
            .dispatch(strategy, "q", ms(100))
            .await
            .expect_err("nothing succeeds");
        assert!(
            matches!(err, DispatchError::DeadlineExceeded(_)),
            "{strategy}: {err:?}"
        );
        assert_near(start.elapsed(), ms(100));
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn losing_attempts_are_counted_but_not_charged() {
    let (client, _transport) = scripted_client(&[
        ("a", respond(10, "a")),
        ("b", respond(50, "b")),
        ("c", fail(5)),
    ]);

    client
        .dispatch(Strategy::Broadcast, "q", ms(200))
        .await
        .expect("a answers");

    let stats = client.replica_stats();
    for name in ["a", "b", "c"] {
        assert_eq!(stats[&addr(name)].attempts, 1, "{name}");
    }
    assert_eq!(stats[&addr("a")].wins, 1);
    assert_eq!(stats[&addr("b")].errors, 0);
    assert_eq!(stats[&addr("c")].errors, 1);
}
