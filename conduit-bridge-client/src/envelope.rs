//! Detecting error envelopes in responses.

use std::fmt::Display;

use bytes::Bytes;
use conduit_bridge_core::{ApiError, ERROR_HEADER, FrameReader};
use http::Response;
use http_body::Body;
use http_body_util::BodyExt;

use crate::ClientError;

/// Returns the marker header value if the response carries an error envelope.
pub fn error_marker<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get(ERROR_HEADER)
        .filter(|value| !value.is_empty())
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Check `response` for an error envelope.
///
/// Without the marker header the response is handed back untouched. With
/// it, the body is read as exactly one `ApiError` frame and returned as
/// [`ClientError::Server`]; a body that does not hold one is reported as
/// [`ClientError::MalformedErrorBody`] instead.
pub async fn check_for_error<B>(response: Response<B>) -> Result<Response<B>, ClientError>
where
    B: Body<Data = Bytes>,
    B::Error: Display,
{
    let Some(marker) = error_marker(&response) else {
        return Ok(response);
    };
    let status = response.status();

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| ClientError::Transport(format!("failed to read error body: {e}")))?
        .to_bytes();

    let mut reader = FrameReader::new(&body[..]);
    match reader.read_message::<ApiError>().await {
        Ok(Some(error)) => Err(ClientError::Server {
            status,
            marker,
            message: error.error,
        }),
        Ok(None) => Err(ClientError::MalformedErrorBody {
            marker,
            reason: "error body holds no frame".to_string(),
        }),
        Err(e) => Err(ClientError::MalformedErrorBody {
            marker,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_bridge_core::{encode_frame, encode_message};
    use http::StatusCode;
    use http_body_util::Full;

    fn response(marker: Option<&str>, status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
        let mut builder = Response::builder().status(status);
        if let Some(marker) = marker {
            builder = builder.header(ERROR_HEADER, marker);
        }
        builder.body(Full::new(body)).unwrap()
    }

    #[tokio::test]
    async fn test_no_marker_passes_through() {
        let body = encode_message(&ApiError::new("not an error"));
        let checked = check_for_error(response(None, StatusCode::OK, body.clone()))
            .await
            .unwrap();
        let bytes = checked.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, body);
    }

    #[tokio::test]
    async fn test_empty_marker_is_ignored() {
        let checked = check_for_error(response(Some(""), StatusCode::OK, Bytes::new())).await;
        assert!(checked.is_ok());
    }

    #[tokio::test]
    async fn test_marker_decodes_error_frame() {
        let body = encode_message(&ApiError::new("expected error"));
        let err = check_for_error(response(
            Some("Internal Server Error"),
            StatusCode::INTERNAL_SERVER_ERROR,
            body,
        ))
        .await
        .unwrap_err();

        match err {
            ClientError::Server {
                status,
                marker,
                message,
            } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(marker, "Internal Server Error");
                assert_eq!(message, "expected error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_marker_with_garbage_body_is_malformed() {
        // Valid frame whose payload is not an ApiError.
        let body = encode_frame(&[0xff, 0xff, 0xff]);
        let err = check_for_error(response(Some("Bad Request"), StatusCode::BAD_REQUEST, body))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MalformedErrorBody { .. }));
    }

    #[tokio::test]
    async fn test_marker_with_empty_body_is_malformed() {
        let err = check_for_error(response(
            Some("Internal Server Error"),
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::new(),
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::MalformedErrorBody { .. }));
    }

    #[tokio::test]
    async fn test_marker_with_truncated_frame_is_malformed() {
        let mut body = encode_message(&ApiError::new("expected error")).to_vec();
        body.truncate(body.len() - 3);
        let err = check_for_error(response(
            Some("Internal Server Error"),
            StatusCode::INTERNAL_SERVER_ERROR,
            Bytes::from(body),
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::MalformedErrorBody { .. }));
    }
}
