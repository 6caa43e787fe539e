//! Length-prefixed framing.
//!
//! Every message on the wire is wrapped in a frame:
//!
//! ```text
//! [length:4 little-endian u32][payload:length]
//! ```
//!
//! Frames carry no type information; the caller decides out of band which
//! schema a payload decodes as. A zero-length frame is a valid empty message.

use std::io::ErrorKind;

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::FrameError;

/// Size of the frame length prefix.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default maximum payload size accepted by readers (4 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Wrap a payload in a frame.
///
/// The payload length must fit in a `u32`; larger payloads are not
/// representable on the wire and are truncated in the prefix.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.put_u32_le(payload.len() as u32);
    frame.extend_from_slice(payload);
    frame.freeze()
}

/// Serialize a message and wrap it in a frame.
pub fn encode_message<M: Message>(message: &M) -> Bytes {
    encode_frame(&message.encode_to_vec())
}

/// Parse the payload length from the start of `data`.
///
/// # Errors
/// Returns [`FrameError::HeaderTruncated`] if fewer than 4 bytes are given.
pub fn parse_frame_header(data: &[u8]) -> Result<u32, FrameError> {
    let header: [u8; FRAME_HEADER_SIZE] = data
        .get(..FRAME_HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(FrameError::HeaderTruncated { actual: data.len() })?;
    Ok(u32::from_le_bytes(header))
}

/// Fill `buf` from `reader`, looping over short reads.
///
/// Returns the number of bytes read, which is less than `buf.len()` only
/// when the stream reached end-of-data.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one frame payload from `reader`.
///
/// Returns:
/// - `Ok(Some(payload))` for a complete frame
/// - `Ok(None)` if the stream ended cleanly before the next frame began
/// - `Err(FrameError::HeaderTruncated)` if it ended inside the length prefix
/// - `Err(FrameError::Truncated)` if it ended inside the payload
///
/// When `max_frame_size` is set, declared lengths above it are rejected
/// before any payload buffer is allocated.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_size: Option<usize>,
) -> Result<Option<Bytes>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let got = read_full(reader, &mut header).await?;
    if got == 0 {
        return Ok(None);
    }
    let length = parse_frame_header(&header[..got])? as usize;

    tracing::debug!(length, "frame declared its payload size");

    if let Some(limit) = max_frame_size
        && length > limit
    {
        return Err(FrameError::TooLarge { length, limit });
    }

    let mut payload = vec![0u8; length];
    let got = read_full(reader, &mut payload).await?;
    if got < length {
        return Err(FrameError::Truncated {
            expected: length,
            actual: got,
        });
    }

    Ok(Some(Bytes::from(payload)))
}

/// Reads successive frames from a byte stream.
///
/// # Example
///
/// ```ignore
/// let mut reader = FrameReader::new(body_reader);
/// while let Some(event) = reader.read_message::<TapEvent>().await? {
///     println!("{event:?}");
/// }
/// ```
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_size: Option<usize>,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a reader with the default frame size limit.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_frame_size: Some(DEFAULT_MAX_FRAME_SIZE),
        }
    }

    /// Set the maximum accepted payload size. `None` disables the check.
    pub fn with_max_frame_size(mut self, max_frame_size: Option<usize>) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Returns the configured maximum payload size.
    pub fn max_frame_size(&self) -> Option<usize> {
        self.max_frame_size
    }

    /// Read the next raw frame payload. See [`read_frame`].
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        read_frame(&mut self.inner, self.max_frame_size).await
    }

    /// Read the next frame and decode its payload as `M`.
    pub async fn read_message<M>(&mut self) -> Result<Option<M>, FrameError>
    where
        M: Message + Default,
    {
        match self.read_frame().await? {
            Some(payload) => Ok(Some(M::decode(payload)?)),
            None => Ok(None),
        }
    }

    /// Consume the reader and return the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ApiError;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Hands out at most one byte per read call.
    struct Trickle<'a> {
        data: &'a [u8],
    }

    impl AsyncRead for Trickle<'_> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let data = self.data;
            if let Some((first, rest)) = data.split_first() {
                if buf.remaining() > 0 {
                    buf.put_slice(&[*first]);
                    self.data = rest;
                }
            }
            Poll::Ready(Ok(()))
        }
    }

    /// Fails every read.
    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(b"hello");
        assert_eq!(&frame[..4], &[5, 0, 0, 0]);
        assert_eq!(&frame[4..], b"hello");
    }

    #[test]
    fn test_encode_frame_length_is_little_endian() {
        let payload = vec![7u8; 0x0102];
        let frame = encode_frame(&payload);
        assert_eq!(&frame[..4], &[0x02, 0x01, 0x00, 0x00]);
        assert_eq!(frame.len(), 4 + 0x0102);
    }

    #[test]
    fn test_parse_frame_header() {
        assert_eq!(parse_frame_header(&[5, 0, 0, 0, b'x']).unwrap(), 5);
        assert!(matches!(
            parse_frame_header(&[5, 0]),
            Err(FrameError::HeaderTruncated { actual: 2 })
        ));
    }

    #[tokio::test]
    async fn test_read_frame_round_trip() {
        for payload in [&b""[..], &b"a"[..], &b"hello world"[..], &[0u8; 1024][..]] {
            let frame = encode_frame(payload);
            let mut src = &frame[..];
            let decoded = read_frame(&mut src, None).await.unwrap().unwrap();
            assert_eq!(&decoded[..], payload);
            assert!(read_frame(&mut src, None).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_read_frame_survives_one_byte_reads() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let mut wire = encode_frame(&payload).to_vec();
        wire.extend_from_slice(&encode_frame(b"second"));

        let mut src = Trickle { data: &wire };
        let first = read_frame(&mut src, None).await.unwrap().unwrap();
        assert_eq!(&first[..], &payload[..]);
        let second = read_frame(&mut src, None).await.unwrap().unwrap();
        assert_eq!(&second[..], b"second");
        assert!(read_frame(&mut src, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_truncated_payload() {
        let mut wire = 100u32.to_le_bytes().to_vec();
        wire.extend_from_slice(&[1u8; 50]);

        let mut src = Trickle { data: &wire };
        let err = read_frame(&mut src, None).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 100,
                actual: 50
            }
        ));
    }

    #[tokio::test]
    async fn test_read_frame_truncated_header() {
        let mut src: &[u8] = &[3, 0, 0];
        let err = read_frame(&mut src, None).await.unwrap_err();
        assert!(matches!(err, FrameError::HeaderTruncated { actual: 3 }));
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_before_reading() {
        let wire = (1024u32 * 1024).to_le_bytes();
        let mut src = &wire[..];
        let err = read_frame(&mut src, Some(1024)).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooLarge {
                length: 1_048_576,
                limit: 1024
            }
        ));
    }

    #[tokio::test]
    async fn test_read_frame_propagates_io_errors() {
        let err = read_frame(&mut Broken, None).await.unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[tokio::test]
    async fn test_frame_reader_decodes_messages() {
        let mut wire = encode_message(&ApiError::new("first")).to_vec();
        wire.extend_from_slice(&encode_message(&ApiError::new("")));

        let mut reader = FrameReader::new(Trickle { data: &wire });
        assert_eq!(
            reader.read_message::<ApiError>().await.unwrap(),
            Some(ApiError::new("first"))
        );
        assert_eq!(
            reader.read_message::<ApiError>().await.unwrap(),
            Some(ApiError::new(""))
        );
        assert_eq!(reader.read_message::<ApiError>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_frame_reader_reports_malformed_payload() {
        // 0xff is not a valid protobuf tag
        let wire = encode_frame(&[0xff, 0xff]);
        let mut reader = FrameReader::new(&wire[..]);
        let err = reader.read_message::<ApiError>().await.unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }
}
