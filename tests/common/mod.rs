//! Scripted in-memory transport for dispatch tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use replica_dispatch::{
    ClusterClient, DispatchConfig, ReplicaAddress, ReplicaSet, Transport, TransportError,
};
use tokio::time::{self, Instant};

/// How a scripted replica answers every call.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Respond { after: Duration, body: &'static str },
    Fail { after: Duration },
    Hang,
}

pub fn respond(after_ms: u64, body: &'static str) -> Behavior {
    Behavior::Respond {
        after: Duration::from_millis(after_ms),
        body,
    }
}

pub fn fail(after_ms: u64) -> Behavior {
    Behavior::Fail {
        after: Duration::from_millis(after_ms),
    }
}

pub fn addr(name: &str) -> ReplicaAddress {
    ReplicaAddress::from(name)
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Asserts `actual` is within a couple of timer ticks of `expected`.
#[track_caller]
pub fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + ms(2),
        "elapsed {actual:?}, expected about {expected:?}"
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCall {
    pub replica: String,
    pub at: Duration,
}

/// A transport whose replicas follow fixed scripts and which remembers every
/// call it was asked to make.
#[derive(Clone)]
pub struct ScriptedTransport {
    behaviors: Arc<HashMap<String, Behavior>>,
    sent: Arc<Mutex<Vec<SentCall>>>,
    epoch: Instant,
}

impl ScriptedTransport {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: Arc::new(
                behaviors
                    .iter()
                    .map(|(name, b)| (name.to_string(), *b))
                    .collect(),
            ),
            sent: Arc::new(Mutex::new(Vec::new())),
            epoch: Instant::now(),
        }
    }

    /// Calls made so far, in issue order.
    pub fn sent(&self) -> Vec<SentCall> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_replicas(&self) -> Vec<String> {
        self.sent().into_iter().map(|c| c.replica).collect()
    }
}

impl Transport for ScriptedTransport {
    type Response = String;

    fn send(
        &self,
        replica: &ReplicaAddress,
        query: &str,
    ) -> BoxFuture<'static, Result<String, TransportError>> {
        self.sent.lock().unwrap().push(SentCall {
            replica: replica.to_string(),
            at: self.epoch.elapsed(),
        });

        let behavior = self
            .behaviors
            .get(replica.as_str())
            .copied()
            .unwrap_or(Behavior::Hang);
        let query = query.to_string();
        let name = replica.to_string();

        async move {
            match behavior {
                Behavior::Respond { after, body } => {
                    time::sleep(after).await;
                    Ok(format!("{body}:{query}"))
                }
                Behavior::Fail { after } => {
                    time::sleep(after).await;
                    Err(TransportError::Other(format!("{name} is down")))
                }
                Behavior::Hang => futures::future::pending().await,
            }
        }
        .boxed()
    }
}

/// Builds a client over scripted replicas, in the given order.
pub fn scripted_client(
    behaviors: &[(&str, Behavior)],
) -> (ClusterClient<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::new(behaviors);
    let replicas = ReplicaSet::new(behaviors.iter().map(|(name, _)| *name))
        .expect("at least one replica");
    let client = ClusterClient::new(replicas, transport.clone(), DispatchConfig::default());
    (client, transport)
}
