use std::time::Duration;

use crate::config::ReplicaAddress;

/// Reasons a single replica attempt can fail.
///
/// The dispatcher treats every variant the same way: the replica failed this
/// attempt and the strategy moves on.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The request could not be sent or its body could not be read.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The replica answered with a non-success status code.
    #[error("replica responded with status {0}")]
    Status(u16),

    /// Any other transport-specific failure.
    #[error("{0}")]
    Other(String),
}

/// One replica failed one attempt.
#[derive(thiserror::Error, Debug)]
#[error("replica {replica} failed")]
pub struct ReplicaFailure {
    pub replica: ReplicaAddress,
    #[source]
    pub source: TransportError,
}

/// Errors that can occur during a dispatched request.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    /// No replicas were configured.
    #[error("no replicas configured")]
    NoReplicas,

    /// Every replica was attempted and failed before any timer expired.
    ///
    /// Carries the last failure observed.
    #[error("all replicas failed")]
    AllReplicasFailed(#[source] ReplicaFailure),

    /// No replica answered successfully within the total timeout.
    #[error("request timed out after {0:?}")]
    DeadlineExceeded(Duration),
}
