//! Client-side error types.
//!
//! This module provides [`ClientError`], the error type for bridge calls.

use std::time::Duration;

use conduit_bridge_core::FrameError;
use http::StatusCode;

/// Errors returned by client operations.
///
/// A server-reported failure ([`ClientError::Server`]) and a stream that
/// ended in the middle of a frame ([`ClientError::Frame`] or
/// [`ClientError::Transport`]) are distinct outcomes; neither is ever
/// reported as a normal end of stream.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with an error envelope.
    #[error("server error ({status}): {message}")]
    Server {
        status: StatusCode,
        /// Value of the marker header, the status reason phrase.
        marker: String,
        message: String,
    },

    /// The marker header was set but the body did not hold a valid error frame.
    #[error("malformed error body ({marker}): {reason}")]
    MalformedErrorBody { marker: String, reason: String },

    /// Transport-level error (connection failed, body aborted, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request could not be built.
    #[error("request error: {0}")]
    Request(String),

    /// A frame payload did not decode as the expected message.
    #[error("decode error: {0}")]
    Decode(String),

    /// The response stream ended inside a frame or declared an oversized frame.
    #[error(transparent)]
    Frame(FrameError),

    /// Non-success status without an error envelope.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(StatusCode),

    /// A unary response body held no frame.
    #[error("response ended before a message was received")]
    EmptyResponse,

    /// The call did not complete within the configured timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Returns whether the server reported this error through an envelope.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ClientError::Server { .. })
    }

    /// Returns whether the response stream ended abnormally.
    pub fn is_abnormal_end(&self) -> bool {
        match self {
            ClientError::Frame(err) => err.is_truncation(),
            ClientError::Transport(_) => true,
            _ => false,
        }
    }

    /// The HTTP status, if the error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Server { status, .. } | ClientError::UnexpectedStatus(status) => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// The server's error text, for [`ClientError::Server`].
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Server { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => ClientError::Transport(e.to_string()),
            FrameError::Decode(e) => ClientError::Decode(e.to_string()),
            other => ClientError::Frame(other),
        }
    }
}
