//! Runs dashboard calls in the background.

use std::{error::Error, time::Duration};

use replica_dispatch::{
    ClusterClient, DispatchError, HttpTransport, ReplicaAddress, Strategy, Transport,
};
use tokio::{sync::mpsc, time};

use crate::app::{App, AppEvent, Finished, Mode, Verdict};

const PREVIEW_CHARS: usize = 48;

/// Spawns one call in the app's current mode and reports it on `tx`.
pub fn spawn_call(app: &App, tx: mpsc::UnboundedSender<AppEvent>, batch: bool) {
    let client = app.client.clone();
    let mode = app.mode;
    let target = app.selected_replica();
    let query = app.query.clone();
    let timeout = app.timeout;

    tokio::spawn(async move {
        let start = time::Instant::now();
        let verdict = match (mode, target) {
            (Mode::Dispatch(strategy), _) => {
                via_strategy(&client, strategy, &query, timeout).await
            }
            (Mode::Direct, Some(replica)) => direct(&client, replica, &query, timeout).await,
            (Mode::Direct, None) => Verdict::AllFailed {
                cause: "no replica selected".to_string(),
            },
        };

        let _ = tx.send(AppEvent::Finished(Finished {
            mode,
            elapsed: start.elapsed(),
            verdict,
            batch,
        }));
    });
}

async fn via_strategy(
    client: &ClusterClient<HttpTransport>,
    strategy: Strategy,
    query: &str,
    timeout: Duration,
) -> Verdict {
    match client.dispatch(strategy, query, timeout).await {
        Ok((replica, body)) => Verdict::Served {
            replica,
            preview: preview(&body),
        },
        Err(DispatchError::DeadlineExceeded(_)) => Verdict::DeadlineExceeded,
        Err(e) => Verdict::AllFailed { cause: chain(&e) },
    }
}

/// Sends through the client's own transport so direct calls share its
/// connection pool, but skips the dispatcher and its bookkeeping.
async fn direct(
    client: &ClusterClient<HttpTransport>,
    replica: ReplicaAddress,
    query: &str,
    timeout: Duration,
) -> Verdict {
    let call = client.transport().send(&replica, query);
    match time::timeout(timeout, call).await {
        Ok(Ok(body)) => Verdict::Served {
            preview: preview(&body),
            replica,
        },
        Ok(Err(e)) => Verdict::ReplicaError {
            replica,
            cause: chain(&e),
        },
        Err(_) => Verdict::DeadlineExceeded,
    }
}

/// `outer: inner: root` for an error and its sources.
fn chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn preview(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    let mut out: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS || body.lines().nth(1).is_some() {
        out.push('…');
    }
    out
}
