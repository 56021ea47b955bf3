//! Environment configuration for the dashboard.

use std::{env, time::Duration};

use color_eyre::{eyre::WrapErr, Result};
use replica_dispatch::{ClusterClient, DispatchConfig, HttpTransport, ReplicaSet, Strategy};

/// Dashboard settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub replicas: ReplicaSet,
    pub strategy: Strategy,
    pub timeout: Duration,
    pub query: String,
    pub log_file: Option<String>,
}

/// Reads dashboard settings from environment variables.
///
/// - `REPLICA_URLS` (required): comma-separated replica base URLs
/// - `DISPATCH_STRATEGY`: `broadcast`, `sequential` or `hedged` (default `hedged`)
/// - `DISPATCH_TIMEOUT_MS`: total budget per call (default 2000)
/// - `DISPATCH_QUERY`: query sent on every call (default `ping`)
/// - `DISPATCH_LOG`: file that receives tracing output
pub fn settings_from_env() -> Result<Settings> {
    let urls = env::var("REPLICA_URLS").unwrap_or_default();
    let urls: Vec<String> = urls
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(String::from)
        .collect();

    if urls.is_empty() {
        color_eyre::eyre::bail!(
            "No replicas configured.\n\
             Set REPLICA_URLS to a comma-separated list, e.g. \
             REPLICA_URLS=http://127.0.0.1:8001/,http://127.0.0.1:8002/"
        );
    }
    let replicas = ReplicaSet::new(urls)?;

    let defaults = DispatchConfig::default();
    let strategy = match env::var("DISPATCH_STRATEGY") {
        Ok(s) => s.parse().wrap_err("invalid DISPATCH_STRATEGY")?,
        Err(_) => defaults.strategy,
    };
    let timeout = match env::var("DISPATCH_TIMEOUT_MS") {
        Ok(ms) => Duration::from_millis(ms.trim().parse().wrap_err("invalid DISPATCH_TIMEOUT_MS")?),
        Err(_) => defaults.timeout,
    };

    Ok(Settings {
        replicas,
        strategy,
        timeout,
        query: env::var("DISPATCH_QUERY").unwrap_or_else(|_| "ping".to_string()),
        log_file: env::var("DISPATCH_LOG").ok(),
    })
}

/// Builds an HTTP cluster client from the environment settings.
pub fn build_client_from_env() -> Result<(ClusterClient<HttpTransport>, Settings)> {
    let settings = settings_from_env()?;

    let cfg = DispatchConfig {
        strategy: settings.strategy,
        timeout: settings.timeout,
        ..DispatchConfig::default()
    };

    let client = ClusterClient::http(settings.replicas.clone(), cfg);
    Ok((client, settings))
}
