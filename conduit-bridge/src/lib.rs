//! # Conduit Bridge
//!
//! Serve protobuf RPC methods to plain HTTP/1.1 clients with
//! [Axum](https://github.com/tokio-rs/axum).
//!
//! Each request body is one protobuf message. Responses are a sequence of
//! length-prefixed frames (`[u32 little-endian length][payload]`): one frame
//! for a unary method, a flushed frame per message for a server-streaming
//! method. Failures that happen before the first frame is flushed are sent
//! as an HTTP status, a `conduit-error` header and a single frame holding an
//! [`ApiError`].
//!
//! ## Modules
//!
//! - [`router`]: Mount methods under `POST {prefix}/{method}`
//! - [`handler`]: Unary and streaming adapters, and the [`Emitter`]
//! - [`writer`]: The [`FrameWriter`] driving a response
//! - [`sink`]: Response sinks the writer writes into
//! - [`envelope`]: Error envelope writing
//! - [`request`]: Request decoding
//! - [`limits`]: Request size limits
//! - [`error`]: Error types

pub mod envelope;
pub mod error;
pub mod handler;
pub mod limits;
pub mod request;
pub mod router;
pub mod sink;
pub mod writer;

pub use conduit_bridge_core::{
    ApiError, DEFAULT_MAX_FRAME_SIZE, ERROR_HEADER, FRAME_CONTENT_TYPE, FrameError, FrameReader,
    encode_frame, encode_message, read_frame,
};
pub use envelope::write_error;
pub use error::{BackendError, BridgeError};
pub use handler::{EmitError, Emitter, serve_stream, serve_unary};
pub use limits::{DEFAULT_MAX_MESSAGE_SIZE, MessageLimits};
pub use request::decode_request;
pub use router::{BridgeConfig, BridgeRouter, DEFAULT_PATH_PREFIX, MethodKind};
pub use sink::{BufferedSink, ChannelSink, PendingResponse, ResponseSink, SinkError};
pub use writer::FrameWriter;

// Re-export several crates
pub use futures;
pub use prost;
pub use tokio_util::sync::CancellationToken;

pub mod prelude {
    //! A prelude for `conduit-bridge` providing the most common types.
    pub use crate::error::{BackendError, BridgeError};
    pub use crate::handler::{EmitError, Emitter};
    pub use crate::limits::MessageLimits;
    pub use crate::router::{BridgeConfig, BridgeRouter};
}
