use replica_dispatch::{DispatchError, Strategy};
use tokio::time::Instant;

mod common;
use common::*;

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn slow_first_replica_still_wins_after_hedge() {
    // Two replicas over 100ms gives a 50ms hedge delay.
    let (client, transport) = scripted_client(&[("r1", respond(60, "r1")), ("r2", Behavior::Hang)]);

    let start = Instant::now();
    let (winner, body) = client
        .dispatch(Strategy::Hedged, "q", ms(100))
        .await
        .expect("r1 answers");

    assert_eq!(winner.as_str(), "r1");
    assert_eq!(body, "r1:q");
    assert_near(start.elapsed(), ms(60));

    let sent = transport.sent();
    assert_eq!(transport.sent_replicas(), ["r1", "r2"]);
    assert_near(sent[1].at, ms(50));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hedge_wins_when_first_replica_hangs() {
    let (client, _transport) = scripted_client(&[("a", Behavior::Hang), ("b", respond(10, "b"))]);

    let start = Instant::now();
    let (winner, _) = client
        .dispatch(Strategy::Hedged, "q", ms(200))
        .await
        .expect("b answers");

    assert_eq!(winner.as_str(), "b");
    assert_near(start.elapsed(), ms(110));

    // a was still in flight when b won; it counts as neither a win nor an error.
    let stats = client.replica_stats();
    assert_eq!(stats[&addr("a")].errors, 0);
    assert_eq!(stats[&addr("b")].wins, 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failure_waits_for_hedge_timer_while_others_are_in_flight() {
    let (client, transport) = scripted_client(&[
        ("a", Behavior::Hang),
        ("b", fail(5)),
        ("c", respond(1, "c")),
    ]);

    let (winner, _) = client
        .dispatch(Strategy::Hedged, "q", ms(300))
        .await
        .expect("c answers");

    assert_eq!(winner.as_str(), "c");
    let sent = transport.sent();
    assert_eq!(transport.sent_replicas(), ["a", "b", "c"]);
    assert_near(sent[1].at, ms(100));
    assert_near(sent[2].at, ms(200));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failure_with_nothing_in_flight_hedges_immediately() {
    let (client, transport) = scripted_client(&[("a", fail(5)), ("b", respond(10, "b"))]);

    let start = Instant::now();
    let (winner, _) = client
        .dispatch(Strategy::Hedged, "q", ms(1000))
        .await
        .expect("b answers");

    assert_eq!(winner.as_str(), "b");
    assert_near(transport.sent()[1].at, ms(5));
    assert_near(start.elapsed(), ms(15));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn outstanding_attempts_keep_racing_after_the_last_hedge() {
    // a outlives its hedge slice but still answers before the deadline.
    let (client, transport) = scripted_client(&[("a", respond(250, "a")), ("b", Behavior::Hang)]);

    let start = Instant::now();
    let (winner, _) = client
        .dispatch(Strategy::Hedged, "q", ms(300))
        .await
        .expect("a answers");

    assert_eq!(winner.as_str(), "a");
    assert_near(start.elapsed(), ms(250));
    assert_eq!(transport.sent_replicas(), ["a", "b"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn in_flight_attempts_are_awaited_once_every_replica_is_issued() {
    // a fails early, so b is issued at 10ms with a slice ending at 160ms,
    // well before the 300ms deadline.
    let (client, _transport) = scripted_client(&[("a", fail(10)), ("b", respond(200, "b"))]);

    let start = Instant::now();
    let (winner, _) = client
        .dispatch(Strategy::Hedged, "q", ms(300))
        .await
        .expect("b answers");

    assert_eq!(winner.as_str(), "b");
    assert_near(start.elapsed(), ms(210));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn all_failures_report_the_last_one() {
    let (client, _transport) = scripted_client(&[("a", fail(5)), ("b", fail(5))]);

    let err = client
        .dispatch(Strategy::Hedged, "q", ms(1000))
        .await
        .expect_err("every replica fails");

    match err {
        DispatchError::AllReplicasFailed(failure) => assert_eq!(failure.replica.as_str(), "b"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hanging_replicas_hit_the_deadline() {
    let (client, transport) = scripted_client(&[
        ("a", Behavior::Hang),
        ("b", Behavior::Hang),
        ("c", Behavior::Hang),
    ]);

    let start = Instant::now();
    let err = client
        .dispatch(Strategy::Hedged, "q", ms(300))
        .await
        .expect_err("nobody answers");

    assert!(matches!(err, DispatchError::DeadlineExceeded(_)), "unexpected error {err:?}");
    assert_near(start.elapsed(), ms(300));
    assert_eq!(transport.sent().len(), 3);

    let stats = client.replica_stats();
    for name in ["a", "b", "c"] {
        assert_eq!(stats[&addr(name)].errors, 1, "{name} timed out once");
    }
}
