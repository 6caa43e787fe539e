//! Request decoding.
//!
//! Request bodies are raw schema-encoded bytes with no framing: every call
//! carries exactly one request message.

use axum::body::{Body, HttpBody};
use prost::Message;

use crate::error::BridgeError;
use crate::limits::MessageLimits;

/// Read the full request body and decode it as `T`.
///
/// Read failures, oversized bodies and malformed messages are all reported
/// as [`BridgeError::ClientRequest`].
pub async fn decode_request<T>(body: Body, limits: MessageLimits) -> Result<T, BridgeError>
where
    T: Message + Default,
{
    if let Some(size) = body.size_hint().exact() {
        limits
            .check_size(size as usize)
            .map_err(BridgeError::ClientRequest)?;
    }

    let max_size = limits.max_message_size().unwrap_or(usize::MAX);
    let bytes = axum::body::to_bytes(body, max_size)
        .await
        .map_err(|e| BridgeError::ClientRequest(format!("failed to read request body: {e}")))?;

    T::decode(bytes)
        .map_err(|e| BridgeError::ClientRequest(format!("failed to decode request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_bridge_core::ApiError;

    #[tokio::test]
    async fn test_decode_request() {
        let body = Body::from(ApiError::new("hi").encode_to_vec());
        let msg: ApiError = decode_request(body, MessageLimits::default())
            .await
            .unwrap();
        assert_eq!(msg.error, "hi");
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_default() {
        let msg: ApiError = decode_request(Body::empty(), MessageLimits::default())
            .await
            .unwrap();
        assert_eq!(msg, ApiError::default());
    }

    #[tokio::test]
    async fn test_malformed_body_is_client_error() {
        let body = Body::from(vec![0xffu8, 0xff]);
        let err = decode_request::<ApiError>(body, MessageLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ClientRequest(_)));
    }

    #[tokio::test]
    async fn test_oversized_body_is_client_error() {
        let body = Body::from(ApiError::new("x".repeat(64)).encode_to_vec());
        let err = decode_request::<ApiError>(body, MessageLimits::new(16))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ClientRequest(_)));
    }
}
