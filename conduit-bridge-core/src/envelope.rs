//! Error envelope conventions.
//!
//! Application errors are signaled out of band:
//!
//! ```text
//! conduit-error: <HTTP status text>
//!
//! [length:4 LE][ApiError]
//! ```
//!
//! When the marker header is present and non-empty the body holds exactly
//! one frame carrying an [`ApiError`]. When it is absent the body holds zero
//! or more application frames. The header value is a flag carrier only and
//! is never parsed.

/// Response header marking a body that carries an error envelope.
pub const ERROR_HEADER: &str = "conduit-error";

/// Content type of every frame-bearing body.
pub const FRAME_CONTENT_TYPE: &str = "application/octet-stream";

/// Error message carried in the single frame of an error envelope.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ApiError {
    #[prost(string, tag = "1")]
    pub error: String,
}

impl ApiError {
    /// Create an error message with the given text.
    pub fn new<S: Into<String>>(error: S) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_api_error_schema() {
        let encoded = ApiError::new("boom").encode_to_vec();
        // field 1, wire type 2 (length-delimited), length 4
        assert_eq!(&encoded[..2], &[0x0a, 0x04]);
        assert_eq!(&encoded[2..], b"boom");

        let decoded = ApiError::decode(encoded.as_slice()).unwrap();
        assert_eq!(decoded.error, "boom");
    }

    #[test]
    fn test_empty_api_error_encodes_to_nothing() {
        assert!(ApiError::new("").encode_to_vec().is_empty());
    }
}
