use std::borrow::Cow;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tether_discord::{
    encode, encode_error,
    verify::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
    InboundRequest, WireBody, WireResponse,
};
use tracing::debug;

use crate::routes::AppState;

pub async fn interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = header_value(&headers, SIGNATURE_HEADER);
    let timestamp = header_value(&headers, TIMESTAMP_HEADER);

    debug!(
        event_name = "ingress.discord.received",
        body_bytes = body.len(),
        "interaction request received"
    );

    let request = InboundRequest {
        signature: signature.as_deref(),
        timestamp: timestamp.as_deref(),
        body: &body,
    };
    let wire = match state.dispatcher.dispatch(&request) {
        Ok(outcome) => encode(&outcome),
        Err(error) => encode_error(&error),
    };
    into_response(wire)
}

// Non-UTF-8 header bytes are passed through lossily so they fail verification
// instead of reading as absent.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<Cow<'a, str>> {
    headers.get(name).map(|value| String::from_utf8_lossy(value.as_bytes()))
}

fn into_response(wire: WireResponse) -> Response {
    let status = StatusCode::from_u16(wire.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match wire.body {
        WireBody::Json(value) => (status, Json(value)).into_response(),
        WireBody::Text(text) => (status, text).into_response(),
        WireBody::Empty => status.into_response(),
    }
}
