use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tether_core::errors::{ApplicationError, InterfaceError};
use tracing::{error, info};

use crate::routes::AppState;

/// Relays `{"content": string}` to the configured default channel.
pub async fn message(State(state): State<AppState>, body: Bytes) -> Response {
    match relay(&state, &body).await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(app_error) => interface_response(app_error.into_interface("message-relay")),
    }
}

async fn relay(state: &AppState, body: &[u8]) -> Result<(), ApplicationError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|_| ApplicationError::InvalidRequest("Invalid JSON".to_owned()))?;
    let content = payload
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| ApplicationError::InvalidRequest("Content not found".to_owned()))?;

    state.rest.send_message(content, None).await.map_err(|rest_error| {
        error!(
            event_name = "egress.discord.message_failed",
            correlation_id = "message-relay",
            error = %rest_error,
            "relaying message to discord failed"
        );
        ApplicationError::Integration(rest_error.to_string())
    })?;

    info!(
        event_name = "egress.discord.message_relayed",
        correlation_id = "message-relay",
        content_chars = content.chars().count(),
        "message relayed to default channel"
    );
    Ok(())
}

fn interface_response(error: InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, error.user_message().to_owned()).into_response()
}
