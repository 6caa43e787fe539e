//! Mounting backend methods on an axum router.
//!
//! Every registered method is served at `POST {prefix}/{method}`. Requests
//! for any other path get a 404 error envelope.
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_bridge::prelude::*;
//! # #[derive(Clone, PartialEq, prost::Message)]
//! # struct Empty {}
//! # #[derive(Clone, PartialEq, prost::Message)]
//! # struct Pod { #[prost(string, tag = "1")] name: String }
//!
//! let app: axum::Router = BridgeRouter::new()
//!     .unary("ListPods", |_req: Empty| async {
//!         Ok::<_, BackendError>(Pod { name: "web-0".into() })
//!     })
//!     .server_stream("WatchPods", |_req: Empty, emitter: Emitter<Pod>| async move {
//!         emitter.send(Pod { name: "web-0".into() }).await?;
//!         Ok::<_, BackendError>(())
//!     })
//!     .build();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::Uri,
    response::{IntoResponse, Response},
    routing::post,
};
use futures::future::{BoxFuture, FutureExt};
use prost::Message;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{BackendError, BridgeError};
use crate::handler::{Emitter, serve_stream, serve_unary};
use crate::limits::MessageLimits;
use crate::sink::ChannelSink;

/// Default path prefix for bridged methods.
pub const DEFAULT_PATH_PREFIX: &str = "/api/v1";

/// Settings shared by every method of a [`BridgeRouter`].
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    path_prefix: String,
    limits: MessageLimits,
    stream_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            limits: MessageLimits::default(),
            stream_capacity: 1,
        }
    }
}

impl BridgeConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path prefix methods are mounted under.
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Set request size limits.
    pub fn limits(mut self, limits: MessageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set how many flushed chunks may queue ahead of a slow client.
    ///
    /// Values below 1 are treated as 1.
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// Get the request size limits.
    pub fn get_limits(&self) -> MessageLimits {
        self.limits
    }

    /// Get the stream capacity.
    pub fn get_stream_capacity(&self) -> usize {
        self.stream_capacity
    }

    /// Route path for `method`.
    pub fn method_path(&self, method: &str) -> String {
        let prefix = self.path_prefix.trim_end_matches('/');
        if prefix.starts_with('/') || prefix.is_empty() {
            format!("{prefix}/{method}")
        } else {
            format!("/{prefix}/{method}")
        }
    }
}

type UnaryFn = Arc<dyn Fn(Body, ChannelSink) -> BoxFuture<'static, ()> + Send + Sync>;
type StreamFn =
    Arc<dyn Fn(Body, ChannelSink, CancellationToken) -> BoxFuture<'static, ()> + Send + Sync>;

/// A registered, type-erased backend method.
#[derive(Clone)]
pub enum MethodKind {
    /// One request, one response.
    Unary(UnaryHandler),
    /// One request, many responses.
    ServerStream(StreamHandler),
}

/// Erased unary method.
#[derive(Clone)]
pub struct UnaryHandler(UnaryFn);

/// Erased server-streaming method.
#[derive(Clone)]
pub struct StreamHandler(StreamFn);

impl MethodKind {
    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Unary(_) => "unary",
            MethodKind::ServerStream(_) => "server_stream",
        }
    }

    fn call(
        &self,
        body: Body,
        sink: ChannelSink,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        match self {
            MethodKind::Unary(handler) => (handler.0)(body, sink),
            MethodKind::ServerStream(handler) => (handler.0)(body, sink, cancel),
        }
    }
}

impl fmt::Debug for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder that exposes backend methods over HTTP.
#[derive(Debug, Default)]
pub struct BridgeRouter {
    config: BridgeConfig,
    methods: BTreeMap<String, MethodKind>,
}

impl BridgeRouter {
    /// Create a router with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with `config`.
    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            config,
            methods: BTreeMap::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Look up a registered method.
    pub fn method(&self, name: &str) -> Option<&MethodKind> {
        self.methods.get(name)
    }

    /// Register a unary method under `name`.
    pub fn unary<Req, Res, F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, BackendError>> + Send + 'static,
        Req: Message + Default + 'static,
        Res: Message + 'static,
    {
        let limits = self.config.limits;
        let handler = Arc::new(handler);
        let erased: UnaryFn = Arc::new(move |body: Body, sink: ChannelSink| {
            let handler = handler.clone();
            async move {
                serve_unary(&*handler, body, limits, sink).await;
            }
            .boxed()
        });
        self.insert(name.into(), MethodKind::Unary(UnaryHandler(erased)))
    }

    /// Register a server-streaming method under `name`.
    pub fn server_stream<Req, Res, F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Req, Emitter<Res>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BackendError>> + Send + 'static,
        Req: Message + Default + 'static,
        Res: Message + 'static,
    {
        let limits = self.config.limits;
        let handler = Arc::new(handler);
        let erased: StreamFn = Arc::new(
            move |body: Body, sink: ChannelSink, cancel: CancellationToken| {
                let handler = handler.clone();
                async move {
                    serve_stream(&*handler, body, limits, sink, cancel).await;
                }
                .boxed()
            },
        );
        self.insert(name.into(), MethodKind::ServerStream(StreamHandler(erased)))
    }

    fn insert(mut self, name: String, method: MethodKind) -> Self {
        if self.methods.insert(name.clone(), method).is_some() {
            tracing::warn!(method = %name, "method registered twice; keeping the last one");
        }
        self
    }

    /// Build the axum router.
    pub fn build(self) -> Router {
        let config = Arc::new(self.config);
        let mut router = Router::new();

        for (name, method) in self.methods {
            let path = config.method_path(&name);
            tracing::debug!(%path, kind = method.as_str(), "mounting method");
            let name: Arc<str> = name.into();
            let config = config.clone();
            router = router.route(
                &path,
                post(move |request: Request| {
                    dispatch(name.clone(), method.clone(), config.clone(), request)
                }),
            );
        }

        router.fallback(unknown_method)
    }
}

async fn dispatch(
    name: Arc<str>,
    method: MethodKind,
    config: Arc<BridgeConfig>,
    request: Request,
) -> Response {
    let span = tracing::debug_span!("bridge_call", method = %name, kind = method.as_str());
    let (sink, pending) = ChannelSink::new(config.stream_capacity);

    // Cancel the call if this future is dropped before the head is ready.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let call = method.call(request.into_body(), sink, cancel);
    tokio::spawn(call.instrument(span));

    let response = pending.response().await;
    guard.disarm();

    match response {
        Some(response) => response,
        None => {
            tracing::error!(method = %name, "method task ended without a response");
            BridgeError::Transport("method ended without a response".to_string()).into_response()
        }
    }
}

async fn unknown_method(uri: Uri) -> Response {
    let method = uri.path().rsplit('/').next().unwrap_or_default();
    tracing::debug!(path = %uri.path(), "no method registered for path");
    BridgeError::UnknownMethod(method.to_string()).into_response()
}
