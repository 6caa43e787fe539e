//! Frame stream writer.
//!
//! Writes framed messages into a [`ResponseSink`] in one of two modes:
//!
//! - **Single-shot**: [`FrameWriter::write_single`] writes one frame and the
//!   body ends when the sink is dropped.
//! - **Streaming**: [`FrameWriter::start_streaming`] marks the response as a
//!   kept-alive chunked body, then every [`FrameWriter::send`] writes a frame
//!   and flushes it. A flushed frame is on the wire and cannot be retracted.
//!
//! # Failure after commit
//!
//! The error envelope lives in a header, and headers are gone once the first
//! frame is flushed. Errors raised after that point cannot be reported as an
//! envelope. [`FrameWriter::write_error`] instead aborts the body, which the
//! client observes as a stream that ended abnormally rather than cleanly.
//! Clients must therefore treat an abnormal end of stream as a failure of the
//! call, in addition to an explicit error envelope.

use axum::http::{HeaderValue, header};
use conduit_bridge_core::{FRAME_CONTENT_TYPE, encode_message};
use prost::Message;

use crate::envelope;
use crate::error::BridgeError;
use crate::sink::ResponseSink;

/// Writes frames for one response.
#[derive(Debug)]
pub struct FrameWriter<S> {
    sink: S,
    streaming: bool,
    frames_written: u64,
}

impl<S: ResponseSink> FrameWriter<S> {
    /// Create a writer over `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            streaming: false,
            frames_written: 0,
        }
    }

    /// Returns whether streaming mode is active.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Number of application frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Get a reference to the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the writer and return the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    fn set_content_type(&mut self) {
        self.sink.set_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static(FRAME_CONTENT_TYPE),
        );
    }

    /// Write `message` as the only frame of the response.
    pub async fn write_single<M: Message>(&mut self, message: &M) -> Result<(), BridgeError> {
        self.set_content_type();
        self.sink.write(encode_message(message)).await?;
        self.frames_written += 1;
        Ok(())
    }

    /// Switch the response into streaming mode.
    ///
    /// Must be called before any frame is written.
    ///
    /// # Errors
    /// Returns [`BridgeError::StreamingUnsupported`] if the sink cannot flush.
    pub fn start_streaming(&mut self) -> Result<(), BridgeError> {
        if self.streaming {
            return Ok(());
        }
        if !self.sink.supports_flush() {
            return Err(BridgeError::StreamingUnsupported);
        }
        self.set_content_type();
        self.sink
            .set_header(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        self.sink.set_header(
            header::TRANSFER_ENCODING,
            HeaderValue::from_static("chunked"),
        );
        self.streaming = true;
        Ok(())
    }

    /// Write `message` as the next frame and flush it to the client.
    ///
    /// Enters streaming mode first if needed.
    pub async fn send<M: Message>(&mut self, message: &M) -> Result<(), BridgeError> {
        self.start_streaming()?;
        self.sink.write(encode_message(message)).await?;
        self.sink.flush().await?;
        self.frames_written += 1;
        Ok(())
    }

    /// Report `err` to the client as well as the response state allows.
    ///
    /// Before commit this writes a status and error envelope. After commit
    /// the marker header can no longer reach the client, so the body is
    /// aborted instead.
    pub async fn write_error(&mut self, err: &BridgeError) {
        if !self.sink.is_committed() {
            envelope::write_error(&mut self.sink, err).await;
            return;
        }

        tracing::warn!(
            error = %err,
            frames_written = self.frames_written,
            "error after response was committed; aborting stream"
        );
        self.sink.abort(err.to_string()).await;
    }
}
