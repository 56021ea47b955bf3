use futures::{future::BoxFuture, FutureExt};

use crate::{config::ReplicaAddress, errors::TransportError};

/// Performs one call to one replica.
///
/// The returned future is dropped when the dispatcher stops waiting on it, so
/// implementations get best-effort cancellation by not detaching their work.
pub trait Transport: Send + Sync + 'static {
    /// Successful payload, handed back to the caller untouched.
    type Response: Send + 'static;

    fn send(
        &self,
        replica: &ReplicaAddress,
        query: &str,
    ) -> BoxFuture<'static, Result<Self::Response, TransportError>>;
}

/// HTTP transport issuing `GET <replica>?query=<query>` and returning the body text.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    type Response = String;

    fn send(
        &self,
        replica: &ReplicaAddress,
        query: &str,
    ) -> BoxFuture<'static, Result<String, TransportError>> {
        let request = self
            .http
            .get(replica.as_str())
            .query(&[("query", query)]);

        async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }
            Ok(response.text().await?)
        }
        .boxed()
    }
}
