//! Server-side error taxonomy.
//!
//! Every failure the bridge can report maps to an HTTP status. Errors found
//! before the response head is committed are sent as that status plus an
//! error envelope; see [`FrameWriter::write_error`](crate::FrameWriter::write_error)
//! for what happens afterwards.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::envelope::error_envelope_response;

/// Failure reported by a backend method.
///
/// The message is forwarded verbatim to the client inside the error envelope.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    /// Create a backend error with the given message.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<crate::handler::EmitError> for BackendError {
    fn from(err: crate::handler::EmitError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors produced while bridging one HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The request body could not be read or decoded. Caller-attributable.
    #[error("invalid request: {0}")]
    ClientRequest(String),

    /// No method is registered under the requested path.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The response could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend method itself failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The response sink cannot flush incrementally.
    #[error("streaming not supported by this writer")]
    StreamingUnsupported,
}

impl BridgeError {
    /// HTTP status used when this error is reported before the response head
    /// is committed.
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::ClientRequest(_) => StatusCode::BAD_REQUEST,
            BridgeError::UnknownMethod(_) => StatusCode::NOT_FOUND,
            BridgeError::Transport(_)
            | BridgeError::Backend(_)
            | BridgeError::StreamingUnsupported => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text carried in the error envelope.
    ///
    /// Backend errors are forwarded without a prefix so clients see exactly
    /// what the method reported.
    pub fn envelope_message(&self) -> String {
        match self {
            BridgeError::ClientRequest(msg) | BridgeError::Transport(msg) => msg.clone(),
            BridgeError::Backend(err) => err.message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<crate::sink::SinkError> for BridgeError {
    fn from(err: crate::sink::SinkError) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        error_envelope_response(&self)
    }
}
