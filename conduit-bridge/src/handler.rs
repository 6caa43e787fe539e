//! Adapters between HTTP exchanges and backend methods.
//!
//! A backend method is either unary, `Fn(Req) -> Result<Res, BackendError>`,
//! or server-streaming, `Fn(Req, Emitter<Res>) -> Result<(), BackendError>`.
//! The adapters decode the request, invoke the method and drive a
//! [`FrameWriter`] with whatever it produces.

use std::future::Future;

use axum::body::Body;
use prost::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{BackendError, BridgeError};
use crate::limits::MessageLimits;
use crate::request::decode_request;
use crate::sink::ResponseSink;
use crate::writer::FrameWriter;

/// Errors returned by [`Emitter::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    /// The response stream is gone; the client will not see more messages.
    #[error("response stream closed")]
    Closed,

    /// The call was cancelled.
    #[error("call cancelled")]
    Cancelled,
}

/// Hands messages produced by a streaming method to the response.
///
/// Messages reach the client in the order they are sent. Once `send` fails
/// the method should stop producing and return; the error converts into a
/// [`BackendError`] so `?` works inside handlers.
#[derive(Debug)]
pub struct Emitter<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> Emitter<T> {
    /// Send one message to the client.
    ///
    /// Waits until the previous message has been flushed.
    pub async fn send(&self, message: T) -> Result<(), EmitError> {
        if self.cancel.is_cancelled() {
            return Err(EmitError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EmitError::Cancelled),
            sent = self.tx.send(message) => sent.map_err(|_| EmitError::Closed),
        }
    }

    /// Returns whether the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the call is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Token that is cancelled when the call is abandoned.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Serve one unary call into `sink`.
///
/// Writes exactly one response frame, or an error envelope if the request
/// is malformed or the method fails.
pub async fn serve_unary<Req, Res, F, Fut, S>(
    handler: &F,
    body: Body,
    limits: MessageLimits,
    sink: S,
) -> S
where
    F: Fn(Req) -> Fut,
    Fut: Future<Output = Result<Res, BackendError>>,
    Req: Message + Default,
    Res: Message,
    S: ResponseSink,
{
    let mut writer = FrameWriter::new(sink);
    let request = match decode_request::<Req>(body, limits).await {
        Ok(request) => request,
        Err(err) => {
            writer.write_error(&err).await;
            return writer.into_inner();
        }
    };

    let result = match handler(request).await {
        Ok(response) => writer.write_single(&response).await,
        Err(err) => Err(BridgeError::Backend(err)),
    };
    if let Err(err) = result {
        writer.write_error(&err).await;
    }
    writer.into_inner()
}

/// Serve one server-streaming call into `sink`.
///
/// Each message the method emits is framed and flushed before the next one
/// is accepted. If the client goes away `cancel` is triggered and further
/// emits fail. A method error before the first flush becomes an error
/// envelope; after it, the body is aborted.
pub async fn serve_stream<Req, Res, F, Fut, S>(
    handler: &F,
    body: Body,
    limits: MessageLimits,
    sink: S,
    cancel: CancellationToken,
) -> S
where
    F: Fn(Req, Emitter<Res>) -> Fut,
    Fut: Future<Output = Result<(), BackendError>>,
    Req: Message + Default,
    Res: Message,
    S: ResponseSink,
{
    let mut writer = FrameWriter::new(sink);
    let request = match decode_request::<Req>(body, limits).await {
        Ok(request) => request,
        Err(err) => {
            writer.write_error(&err).await;
            return writer.into_inner();
        }
    };
    if let Err(err) = writer.start_streaming() {
        writer.write_error(&err).await;
        return writer.into_inner();
    }

    let (tx, rx) = mpsc::channel(1);
    let emitter = Emitter {
        tx,
        cancel: cancel.clone(),
    };

    let produce = handler(request, emitter);
    let consume = async {
        let mut rx = rx;
        while let Some(message) = rx.recv().await {
            if let Err(err) = writer.send(&message).await {
                cancel.cancel();
                return Err(err);
            }
        }
        Ok(())
    };
    let (produced, consumed) = tokio::join!(produce, consume);

    match (produced, consumed) {
        (_, Err(err)) => {
            tracing::debug!(error = %err, "client stopped receiving");
            writer.write_error(&err).await;
        }
        (Err(err), Ok(())) => writer.write_error(&BridgeError::Backend(err)).await,
        (Ok(()), Ok(())) => {
            tracing::debug!(frames = writer.frames_written(), "stream completed");
        }
    }
    writer.into_inner()
}
