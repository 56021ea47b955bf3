use std::{fmt, ops::Deref, str::FromStr, sync::Arc, time::Duration};

use crate::errors::DispatchError;

/// Opaque identifier of one backend replica, usually its base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaAddress(Arc<str>);

impl ReplicaAddress {
    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaAddress {
    fn from(addr: &str) -> Self {
        Self(Arc::from(addr))
    }
}

impl From<String> for ReplicaAddress {
    fn from(addr: String) -> Self {
        Self(Arc::from(addr))
    }
}

/// Fixed, ordered set of interchangeable replicas.
///
/// The set is shared read-only by every call made through a client; cloning it
/// only bumps a reference count.
#[derive(Debug, Clone)]
pub struct ReplicaSet(Arc<[ReplicaAddress]>);

impl ReplicaSet {
    /// Builds a replica set, rejecting an empty list.
    pub fn new<I, A>(replicas: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = A>,
        A: Into<ReplicaAddress>,
    {
        let replicas: Arc<[ReplicaAddress]> = replicas.into_iter().map(Into::into).collect();
        if replicas.is_empty() {
            return Err(DispatchError::NoReplicas);
        }
        Ok(Self(replicas))
    }
}

impl Deref for ReplicaSet {
    type Target = [ReplicaAddress];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Policy used to spread one query over the replica set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Send to every replica at once; the first success wins.
    Broadcast,
    /// Try replicas one at a time, fastest first, each within an equal slice
    /// of the timeout. The last replica gets whatever time remains.
    Sequential,
    /// Like `Sequential`, but slow attempts keep racing after the next replica
    /// has been issued.
    Hedged,
}

impl Strategy {
    /// All strategies, in the order the dashboard cycles through them.
    pub const ALL: [Strategy; 3] = [Strategy::Broadcast, Strategy::Sequential, Strategy::Hedged];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Broadcast => "broadcast",
            Strategy::Sequential => "sequential",
            Strategy::Hedged => "hedged",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown strategy name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown dispatch strategy {0:?} (expected broadcast, sequential or hedged)")]
pub struct ParseStrategyError(String);

impl FromStr for Strategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcast" | "parallel" => Ok(Strategy::Broadcast),
            "sequential" | "round-robin" => Ok(Strategy::Sequential),
            "hedged" | "smart" => Ok(Strategy::Hedged),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Strategy used by [`ClusterClient::process_request`](crate::ClusterClient::process_request).
    pub strategy: Strategy,

    /// Default total budget for callers that do not pick their own.
    pub timeout: Duration,

    /// Number of most recent latency samples kept per replica.
    ///
    /// Older samples fall out of the average once the window is full.
    pub latency_window: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Hedged,
            timeout: Duration::from_secs(2),
            latency_window: 50,
        }
    }
}

impl DispatchConfig {
    /// Creates a low-latency configuration:
    /// - Hedged dispatch
    /// - 1 second timeout
    pub fn low_latency() -> Self {
        Self {
            strategy: Strategy::Hedged,
            timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Creates a conservative configuration that keeps at most one request
    /// in flight:
    /// - Sequential dispatch
    /// - 3 second timeout
    pub fn conservative() -> Self {
        Self {
            strategy: Strategy::Sequential,
            timeout: Duration::from_secs(3),
            ..Self::default()
        }
    }

    /// Creates an aggressive configuration that prioritizes latency over load:
    /// - Broadcast dispatch
    /// - 1 second timeout
    pub fn aggressive() -> Self {
        Self {
            strategy: Strategy::Broadcast,
            timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }
}
