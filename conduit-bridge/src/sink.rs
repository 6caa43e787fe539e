//! Response sinks.
//!
//! A [`ResponseSink`] is the narrow view of the HTTP layer the frame writer
//! needs: status and header mutation, buffered writes, and an optional
//! flush that commits bytes to the network.
//!
//! Two sinks are provided:
//! - [`ChannelSink`]: feeds an axum response; flushing commits the head and
//!   streams each flushed chunk to the client.
//! - [`BufferedSink`]: collects the whole body in memory and cannot flush.

use std::future::Future;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

/// Errors raised by a [`ResponseSink`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The receiving side of the response went away.
    #[error("response stream closed by peer")]
    Closed,

    /// The sink cannot flush incrementally.
    #[error("sink does not support incremental flush")]
    NotFlushable,
}

/// Writable view of one HTTP response.
///
/// Headers and status may only change until the response is committed.
/// Bytes passed to [`write`](ResponseSink::write) are held until
/// [`flush`](ResponseSink::flush) or until the sink is dropped.
pub trait ResponseSink: Send {
    /// Set the response status. Ignored after commit.
    fn set_status(&mut self, status: StatusCode);

    /// Set (replace) a response header. Ignored after commit.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Returns whether the response head has been sent.
    fn is_committed(&self) -> bool;

    /// Append bytes to the response body.
    fn write(&mut self, data: Bytes) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Returns whether [`flush`](ResponseSink::flush) can deliver partial bodies.
    fn supports_flush(&self) -> bool;

    /// Commit the head if needed and push all written bytes to the client.
    fn flush(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Terminate a committed body abnormally so the client cannot mistake it
    /// for a complete one.
    fn abort(&mut self, reason: String) -> impl Future<Output = ()> + Send;
}

type BodyItem = Result<Bytes, std::io::Error>;

/// Resolves to the response head once a [`ChannelSink`] commits.
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    /// Wait for the sink to commit.
    ///
    /// Returns `None` if the sink was lost without committing, which only
    /// happens when the task owning it panicked.
    pub async fn response(self) -> Option<Response> {
        self.rx.await.ok()
    }
}

/// Sink backed by an axum streaming body.
///
/// Until the first flush everything is buffered, so status and headers stay
/// mutable. The first flush sends the head through [`PendingResponse`] and
/// from then on each flush forwards the buffered bytes as one body chunk.
/// Dropping an uncommitted sink delivers a complete, non-streamed response
/// with whatever was written.
#[derive(Debug)]
pub struct ChannelSink {
    status: StatusCode,
    headers: HeaderMap,
    buffer: BytesMut,
    head_tx: Option<oneshot::Sender<Response>>,
    body_tx: mpsc::Sender<BodyItem>,
    body_rx: Option<mpsc::Receiver<BodyItem>>,
    aborted: bool,
}

impl ChannelSink {
    /// Create a sink whose streamed body holds at most `capacity` unsent chunks.
    pub fn new(capacity: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            buffer: BytesMut::new(),
            head_tx: Some(head_tx),
            body_tx,
            body_rx: Some(body_rx),
            aborted: false,
        };
        (sink, PendingResponse { rx: head_rx })
    }

    /// Send the response head. A streamed body reads from the channel, a
    /// complete body takes the current buffer.
    ///
    /// A complete body is sent with its length, so framing headers set in
    /// anticipation of streaming are dropped.
    fn commit(&mut self, streamed: bool) -> Result<(), SinkError> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };

        if !streamed {
            self.headers.remove(header::TRANSFER_ENCODING);
            self.headers.remove(header::CONNECTION);
        }

        let body = match self.body_rx.take() {
            Some(rx) if streamed => Body::from_stream(ReceiverStream::new(rx)),
            _ => Body::from(self.buffer.split().freeze()),
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);

        tracing::debug!(status = %self.status, streamed, "committing response head");
        head_tx.send(response).map_err(|_| SinkError::Closed)
    }
}

impl ResponseSink for ChannelSink {
    fn set_status(&mut self, status: StatusCode) {
        if self.is_committed() {
            tracing::debug!(%status, "status change after commit ignored");
            return;
        }
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.is_committed() {
            tracing::debug!(header = %name, "header change after commit ignored");
            return;
        }
        self.headers.insert(name, value);
    }

    fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    async fn write(&mut self, data: Bytes) -> Result<(), SinkError> {
        if self.is_committed() && self.body_tx.is_closed() {
            return Err(SinkError::Closed);
        }
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        true
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.commit(true)?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        self.body_tx
            .send(Ok(chunk))
            .await
            .map_err(|_| SinkError::Closed)
    }

    async fn abort(&mut self, reason: String) {
        if !self.is_committed() {
            return;
        }
        self.aborted = true;
        self.buffer.clear();
        // A closed channel means the client is already gone.
        let _ = self
            .body_tx
            .send(Err(std::io::Error::other(reason)))
            .await;
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        if !self.is_committed() {
            if self.commit(false).is_err() {
                tracing::debug!("response dropped before the handler returned");
            }
            return;
        }
        if self.aborted || self.buffer.is_empty() {
            return;
        }
        let chunk = self.buffer.split().freeze();
        if self.body_tx.try_send(Ok(chunk)).is_err() {
            tracing::warn!("discarding unflushed response bytes");
        }
    }
}

/// Sink that buffers the entire response and never flushes.
///
/// Models hosts where an intermediary holds the full body; attempting to
/// stream through it fails with
/// [`BridgeError::StreamingUnsupported`](crate::BridgeError::StreamingUnsupported).
#[derive(Debug, Default)]
pub struct BufferedSink {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedSink {
    /// Create an empty sink with status 200.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Current headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into a complete axum response.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for BufferedSink {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    fn is_committed(&self) -> bool {
        false
    }

    async fn write(&mut self, data: Bytes) -> Result<(), SinkError> {
        self.body.extend_from_slice(&data);
        Ok(())
    }

    fn supports_flush(&self) -> bool {
        false
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Err(SinkError::NotFlushable)
    }

    async fn abort(&mut self, _reason: String) {}
}
