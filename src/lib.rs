//! A client-side dispatcher that sends a query to a pool of interchangeable
//! replicas and returns the first usable response within a hard deadline.
//!
//! # Quick Start
//!
//! ```no_run
//! use replica_dispatch::{ClusterClient, DispatchConfig, ReplicaSet};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let replicas = ReplicaSet::new([
//!     "http://replica-1.internal:8080/",
//!     "http://replica-2.internal:8080/",
//!     "http://replica-3.internal:8080/",
//! ])?;
//!
//! let client = ClusterClient::http(replicas, DispatchConfig::low_latency());
//!
//! let body = client.process_request("user:42", Duration::from_millis(300)).await?;
//! println!("got {body}");
//! # Ok(())
//! # }
//! ```
//!
//! # Strategies
//!
//! - [`Strategy::Broadcast`] sends to every replica at once and takes the first success.
//! - [`Strategy::Sequential`] tries replicas fastest first, giving each an equal slice
//!   of the timeout; the last replica gets whatever time is left.
//! - [`Strategy::Hedged`] works like `Sequential` but keeps earlier attempts racing
//!   when it moves on to the next replica.
//!
//! Every strategy stops at the caller's timeout. Replica order comes from a
//! bounded window of recent latencies; replicas without samples go first.
//!
//! # Presets
//!
//! Use `DispatchConfig::low_latency()`, `::conservative()`, or `::aggressive()`
//! for common setups, or build a custom configuration.

pub mod client;
pub mod config;
pub mod errors;
pub mod latency;
pub mod racer;
mod strategy;
pub mod transport;

pub use client::{ClusterClient, ReplicaStatsSnapshot};
pub use config::{DispatchConfig, ReplicaAddress, ReplicaSet, Strategy};
pub use errors::{DispatchError, ReplicaFailure, TransportError};
pub use latency::LatencyTracker;
pub use racer::{DeadlineRacer, Outcome};
pub use transport::{HttpTransport, Transport};
