//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`BridgeClient`].

use std::time::Duration;

use conduit_bridge_core::DEFAULT_MAX_FRAME_SIZE;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::client::BridgeClient;

/// Default path prefix methods are served under.
pub const DEFAULT_PATH_PREFIX: &str = "/api/v1";

/// Builder for creating a [`BridgeClient`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use conduit_bridge_client::ClientBuilder;
///
/// let builder = ClientBuilder::new("http://127.0.0.1:8085/")
///     .path_prefix("rpc")
///     .timeout(Duration::from_secs(5));
/// assert_eq!(builder.method_url("Tap"), "http://127.0.0.1:8085/rpc/Tap");
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    /// Base URL, scheme and authority (e.g., "http://localhost:8085").
    base_url: String,
    /// Prefix between the base URL and the method name.
    path_prefix: String,
    /// Timeout for unary calls and for stream heads.
    timeout: Option<Duration>,
    /// Largest frame payload accepted when reading responses.
    max_frame_size: Option<usize>,
    /// How long idle pooled connections are kept.
    pool_idle_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Create a new builder for `base_url`.
    ///
    /// A trailing slash on the base URL is ignored.
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            timeout: None,
            max_frame_size: Some(DEFAULT_MAX_FRAME_SIZE),
            pool_idle_timeout: None,
        }
    }

    /// Set the path prefix methods are served under.
    ///
    /// Default is `/api/v1`. A missing leading slash is added.
    pub fn path_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        let prefix = prefix.as_ref().trim_matches('/');
        self.path_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("/{prefix}")
        };
        self
    }

    /// Set the timeout for each call.
    ///
    /// For streaming calls this bounds waiting for the response head only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the largest frame payload accepted from the server.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    /// Accept frames of any size.
    pub fn unlimited_frame_size(mut self) -> Self {
        self.max_frame_size = None;
        self
    }

    /// Set the idle timeout for pooled connections.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Full URL a method would be called at.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}{}/{}", self.base_url, self.path_prefix, method)
    }

    /// Build the client.
    ///
    /// Must be called within a tokio runtime before any call is made.
    pub fn build(self) -> BridgeClient {
        let mut builder = Client::builder(TokioExecutor::new());
        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        let client = builder.build_http();

        BridgeClient::from_parts(
            client,
            self.base_url,
            self.path_prefix,
            self.timeout,
            self.max_frame_size,
        )
    }
}
