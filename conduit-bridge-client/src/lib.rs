//! HTTP/1.1 client for conduit bridge endpoints.
//!
//! Calls are plain `POST` requests whose body is one encoded protobuf
//! message. Replies are length-prefixed frames; an error is signalled by the
//! `conduit-error` header and a single [`ApiError`] frame.
//!
//! # Example
//!
//! ```ignore
//! use conduit_bridge_client::BridgeClient;
//!
//! let client = BridgeClient::builder("http://127.0.0.1:8085").build();
//! let mut events = client
//!     .server_stream::<TapRequest, TapEvent>("Tap", &TapRequest::default())
//!     .await?;
//!
//! // `None` is the normal end of the stream; an abnormal end is an error.
//! while let Some(event) = events.receive_next().await? {
//!     println!("{event:?}");
//! }
//! ```
//!
//! # Features
//!
//! - `tracing`: instrument calls and stream lifecycle with `tracing` spans
//!   and events.

mod builder;
mod client;
mod envelope;
mod error;
mod stream;

pub use builder::{ClientBuilder, DEFAULT_PATH_PREFIX};
pub use client::BridgeClient;
pub use envelope::{check_for_error, error_marker};
pub use error::ClientError;
pub use stream::{ResponseStream, open_response_stream};

pub use conduit_bridge_core::{ApiError, ERROR_HEADER, FrameError};

// Re-export several crates
pub use prost;
