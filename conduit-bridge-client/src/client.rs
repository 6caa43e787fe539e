//! Bridge client.
//!
//! [`BridgeClient`] posts one encoded request per call to
//! `{base_url}{prefix}/{method}` over HTTP/1.1 and reads the framed reply.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use conduit_bridge_core::FRAME_CONTENT_TYPE;
use http::{Method, Request, Response, header};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use prost::Message;

#[cfg(feature = "tracing")]
use tracing::{Instrument, info_span};

use crate::ClientError;
use crate::builder::ClientBuilder;
use crate::stream::{ResponseStream, open_response_stream};

/// Type alias for the hyper client over plain HTTP.
pub(crate) type HyperClient = Client<HttpConnector, Full<Bytes>>;

/// Client for a conduit bridge endpoint.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```ignore
/// let client = BridgeClient::builder("http://127.0.0.1:8085").build();
///
/// let pods: ListPodsResponse = client.unary("ListPods", &Empty {}).await?;
///
/// let mut events = client.server_stream::<TapRequest, TapEvent>("Tap", &req).await?;
/// while let Some(event) = events.receive_next().await? {
///     println!("{event:?}");
/// }
/// ```
#[derive(Clone)]
pub struct BridgeClient {
    client: HyperClient,
    base_url: String,
    path_prefix: String,
    timeout: Option<Duration>,
    max_frame_size: Option<usize>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("base_url", &self.base_url)
            .field("path_prefix", &self.path_prefix)
            .field("timeout", &self.timeout)
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Create a builder for a client talking to `base_url`.
    pub fn builder<S: Into<String>>(base_url: S) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub(crate) fn from_parts(
        client: HyperClient,
        base_url: String,
        path_prefix: String,
        timeout: Option<Duration>,
        max_frame_size: Option<usize>,
    ) -> Self {
        Self {
            client,
            base_url,
            path_prefix,
            timeout,
            max_frame_size,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the per-call timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Full URL for `method`.
    pub fn method_url(&self, method: &str) -> String {
        let method = method.strip_prefix('/').unwrap_or(method);
        format!("{}{}/{}", self.base_url, self.path_prefix, method)
    }

    /// Call a unary method.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Server`] when the server answers with an error
    /// envelope, and a transport, frame or decode error when the response
    /// cannot be read.
    pub async fn unary<Req, Res>(&self, method: &str, request: &Req) -> Result<Res, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let call = async {
            let response = self.send(method, request).await?;
            let mut stream = open_response_stream::<Res, _>(response, self.max_frame_size).await?;
            stream.receive_next().await?.ok_or(ClientError::EmptyResponse)
        };
        #[cfg(feature = "tracing")]
        let call = call.instrument(info_span!("bridge.call", method = %method, kind = "unary"));

        self.with_timeout(call).await
    }

    /// Call a server-streaming method.
    ///
    /// Resolves once the response head arrives; messages are then read with
    /// [`ResponseStream::receive_next`]. The timeout, if configured, only
    /// covers waiting for the head.
    pub async fn server_stream<Req, Res>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<ResponseStream<Res>, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let call = async {
            let response = self.send(method, request).await?;
            open_response_stream::<Res, _>(response, self.max_frame_size).await
        };
        #[cfg(feature = "tracing")]
        let call = call.instrument(info_span!(
            "bridge.call",
            method = %method,
            kind = "server_stream"
        ));

        self.with_timeout(call).await
    }

    async fn send<Req: Message>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Response<Incoming>, ClientError> {
        let url = self.method_url(method);
        let req = Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(header::CONTENT_TYPE, FRAME_CONTENT_TYPE)
            .body(Full::new(Bytes::from(request.encode_to_vec())))
            .map_err(|e| ClientError::Request(format!("failed to build request: {e}")))?;

        self.client
            .request(req)
            .await
            .map_err(|e| ClientError::Transport(format!("request failed: {e}")))
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => call.await,
        }
    }
}
