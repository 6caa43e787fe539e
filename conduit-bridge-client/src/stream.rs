//! Reading framed response streams.
//!
//! [`open_response_stream`] checks a response for an error envelope and
//! wraps its body as a byte stream; [`ResponseStream::receive_next`] then
//! decodes one message per frame until the server closes the body.

use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::pin::Pin;

use bytes::Bytes;
use conduit_bridge_core::FrameReader;
use futures::{Stream, TryStreamExt};
use http::Response;
use http_body::Body;
use http_body_util::BodyDataStream;
use prost::Message;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::ClientError;
use crate::envelope::check_for_error;

type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Messages decoded from a framed response body.
///
/// `Ok(None)` from [`receive_next`](Self::receive_next) means the server
/// ended the body cleanly on a frame boundary. A body that stops inside a
/// frame, or whose connection fails, is an error.
pub struct ResponseStream<T> {
    reader: FrameReader<BodyReader>,
    received: u64,
    finished: bool,
    _message: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ResponseStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("received", &self.received)
            .field("finished", &self.finished)
            .field("max_frame_size", &self.reader.max_frame_size())
            .finish_non_exhaustive()
    }
}

impl<T> ResponseStream<T>
where
    T: Message + Default,
{
    /// Wrap a response body without checking for an error envelope.
    ///
    /// `max_frame_size` of `None` accepts frames of any size.
    pub fn from_body<B>(body: B, max_frame_size: Option<usize>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let chunks = BodyDataStream::new(body).map_err(io::Error::other);
        let reader: BodyReader = Box::pin(StreamReader::new(chunks));
        Self {
            reader: FrameReader::new(reader).with_max_frame_size(max_frame_size),
            received: 0,
            finished: false,
            _message: PhantomData,
        }
    }

    /// Number of messages received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Returns whether the stream has ended, cleanly or not.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Receive the next message, or `None` at the normal end of the stream.
    pub async fn receive_next(&mut self) -> Result<Option<T>, ClientError> {
        if self.finished {
            return Ok(None);
        }
        match self.reader.read_message::<T>().await {
            Ok(Some(message)) => {
                self.received += 1;
                Ok(Some(message))
            }
            Ok(None) => {
                self.finished = true;
                #[cfg(feature = "tracing")]
                tracing::debug!(received = self.received, "response stream ended");
                Ok(None)
            }
            Err(err) => {
                self.finished = true;
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %err, received = self.received, "response stream failed");
                Err(err.into())
            }
        }
    }

    /// Adapt into a [`Stream`] that ends after the first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<T, ClientError>> + Send
    where
        T: Send + 'static,
    {
        async_stream::stream! {
            loop {
                match self.receive_next().await {
                    Ok(Some(message)) => yield Ok(message),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }
}

/// Open a framed response as a message stream.
///
/// Frames declaring more than `max_frame_size` payload bytes are rejected;
/// `None` accepts any size.
///
/// Errors reported through an envelope are returned here and no application
/// frame is read. A non-success status without the marker header is
/// [`ClientError::UnexpectedStatus`].
pub async fn open_response_stream<T, B>(
    response: Response<B>,
    max_frame_size: Option<usize>,
) -> Result<ResponseStream<T>, ClientError>
where
    T: Message + Default,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + fmt::Display,
{
    let response = check_for_error(response).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::UnexpectedStatus(status));
    }
    Ok(ResponseStream::from_body(response.into_body(), max_frame_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_bridge_core::{ApiError, ERROR_HEADER, encode_message};
    use futures::StreamExt;
    use http::StatusCode;
    use http_body::Frame;
    use http_body_util::{Full, StreamBody};

    fn frames(messages: &[&str]) -> Bytes {
        let mut out = Vec::new();
        for message in messages {
            out.extend_from_slice(&encode_message(&ApiError::new(*message)));
        }
        Bytes::from(out)
    }

    fn ok_response(body: Bytes) -> Response<Full<Bytes>> {
        Response::new(Full::new(body))
    }

    #[tokio::test]
    async fn test_receive_until_clean_end() {
        let response = ok_response(frames(&["a", "b"]));
        let mut stream = open_response_stream::<ApiError, _>(response, None)
            .await
            .unwrap();
        assert_eq!(stream.receive_next().await.unwrap().unwrap().error, "a");
        assert_eq!(stream.receive_next().await.unwrap().unwrap().error, "b");
        assert!(stream.receive_next().await.unwrap().is_none());
        assert!(stream.is_finished());
        assert_eq!(stream.received(), 2);
        // Stays ended.
        assert!(stream.receive_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_split_across_chunks() {
        let bytes = frames(&["hello", "world"]);
        let chunks: Vec<Result<Frame<Bytes>, io::Error>> = bytes
            .iter()
            .map(|b| Ok(Frame::data(Bytes::copy_from_slice(&[*b]))))
            .collect();
        let body = StreamBody::new(futures::stream::iter(chunks));

        let mut stream = ResponseStream::<ApiError>::from_body(body, None);
        assert_eq!(stream.receive_next().await.unwrap().unwrap().error, "hello");
        assert_eq!(stream.receive_next().await.unwrap().unwrap().error, "world");
        assert!(stream.receive_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_body_is_error() {
        let mut bytes = frames(&["complete", "cut short"]).to_vec();
        bytes.truncate(bytes.len() - 2);
        let mut stream =
            open_response_stream::<ApiError, _>(ok_response(Bytes::from(bytes)), None)
                .await
                .unwrap();
        assert_eq!(
            stream.receive_next().await.unwrap().unwrap().error,
            "complete"
        );
        let err = stream.receive_next().await.unwrap_err();
        assert!(err.is_abnormal_end());
    }

    #[tokio::test]
    async fn test_aborted_body_is_transport_error() {
        let chunks: Vec<Result<Frame<Bytes>, io::Error>> = vec![
            Ok(Frame::data(frames(&["first"]))),
            Err(io::Error::other("connection reset")),
        ];
        let body = StreamBody::new(futures::stream::iter(chunks));

        let mut stream = ResponseStream::<ApiError>::from_body(body, None);
        assert_eq!(stream.receive_next().await.unwrap().unwrap().error, "first");
        let err = stream.receive_next().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_error_envelope_stops_before_frames() {
        let response = Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header(ERROR_HEADER, "Internal Server Error")
            .body(Full::new(frames(&["expected error"])))
            .unwrap();
        let err = open_response_stream::<ApiError, _>(response, None)
            .await
            .unwrap_err();
        assert_eq!(err.server_message(), Some("expected error"));
    }

    #[tokio::test]
    async fn test_unexpected_status_without_marker() {
        let response = Response::builder()
            .status(StatusCode::BAD_GATEWAY)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let err = open_response_stream::<ApiError, _>(response, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus(StatusCode::BAD_GATEWAY)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let response = ok_response(frames(&["this payload is too long"]));
        let mut stream = open_response_stream::<ApiError, _>(response, Some(4))
            .await
            .unwrap();
        let err = stream.receive_next().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Frame(conduit_bridge_core::FrameError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let response = ok_response(frames(&["x", "y", "z"]));
        let stream = open_response_stream::<ApiError, _>(response, None)
            .await
            .unwrap();
        let messages: Vec<String> = stream
            .into_stream()
            .map(|m| m.unwrap().error)
            .collect()
            .await;
        assert_eq!(messages, vec!["x", "y", "z"]);
    }
}
