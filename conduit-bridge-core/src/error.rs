//! Frame decoding errors.

/// Errors raised while reading frames from a byte stream.
///
/// A clean end of stream on a frame boundary is not an error; readers
/// report it as `Ok(None)`. Every variant here means the stream ended or
/// failed somewhere it should not have.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended inside the 4-byte length prefix.
    #[error("incomplete frame header: expected 4 bytes, got {actual}")]
    HeaderTruncated { actual: usize },

    /// The stream ended before the declared payload length was read.
    #[error("frame truncated: declared {expected} payload bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The declared payload length exceeds the reader's limit.
    #[error("frame declares {length} payload bytes, exceeding the limit of {limit}")]
    TooLarge { length: usize, limit: usize },

    /// The payload did not decode as the expected message type.
    #[error("failed to decode frame payload: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The underlying byte stream failed.
    #[error("failed to read frame: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Returns whether the stream ended early, mid-frame.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            FrameError::HeaderTruncated { .. } | FrameError::Truncated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_classification() {
        assert!(FrameError::HeaderTruncated { actual: 2 }.is_truncation());
        assert!(
            FrameError::Truncated {
                expected: 100,
                actual: 50
            }
            .is_truncation()
        );
        assert!(
            !FrameError::TooLarge {
                length: 10,
                limit: 5
            }
            .is_truncation()
        );
        assert!(!FrameError::Io(std::io::Error::other("reset")).is_truncation());
    }

    #[test]
    fn test_display_mentions_counts() {
        let err = FrameError::Truncated {
            expected: 100,
            actual: 50,
        };
        assert_eq!(
            err.to_string(),
            "frame truncated: declared 100 payload bytes, got 50"
        );
    }
}
