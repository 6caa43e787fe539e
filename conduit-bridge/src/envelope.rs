//! Writing error envelopes.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, header},
    response::Response,
};
use conduit_bridge_core::{ApiError, ERROR_HEADER, FRAME_CONTENT_TYPE, encode_message};

use crate::error::BridgeError;
use crate::sink::ResponseSink;

fn error_header() -> HeaderName {
    HeaderName::from_static(ERROR_HEADER)
}

fn marker_value(err: &BridgeError) -> HeaderValue {
    HeaderValue::from_static(err.status().canonical_reason().unwrap_or("Error"))
}

/// Write `err` into `sink` as an error envelope.
///
/// Sets the status and the marker header, then writes exactly one frame
/// holding an [`ApiError`]. This is best effort: if the write fails the
/// failure is logged and its text replaces the marker header value, and
/// nothing is returned to the caller.
pub async fn write_error<S: ResponseSink>(sink: &mut S, err: &BridgeError) {
    sink.set_status(err.status());
    sink.set_header(error_header(), marker_value(err));
    sink.set_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static(FRAME_CONTENT_TYPE),
    );

    let frame = encode_message(&ApiError::new(err.envelope_message()));
    if let Err(write_err) = sink.write(frame).await {
        tracing::error!(error = %write_err, "error writing error to http response");
        if let Ok(value) = HeaderValue::from_str(&write_err.to_string()) {
            sink.set_header(error_header(), value);
        }
    }
}

/// Build a complete error envelope response for `err`.
pub(crate) fn error_envelope_response(err: &BridgeError) -> Response {
    let frame = encode_message(&ApiError::new(err.envelope_message()));
    let mut response = Response::new(Body::from(frame));
    *response.status_mut() = err.status();
    let headers = response.headers_mut();
    headers.insert(error_header(), marker_value(err));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(FRAME_CONTENT_TYPE),
    );
    response
}
