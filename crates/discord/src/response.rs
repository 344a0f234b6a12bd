use serde_json::{json, Value};

use crate::interactions::{DispatchError, DispatchOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionResponseType {
    Pong,
    ChannelMessageWithSource,
    DeferredChannelMessageWithSource,
}

impl InteractionResponseType {
    pub fn code(self) -> u8 {
        match self {
            Self::Pong => 1,
            Self::ChannelMessageWithSource => 4,
            Self::DeferredChannelMessageWithSource => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WireBody {
    Json(Value),
    Text(&'static str),
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WireResponse {
    pub status: u16,
    pub body: WireBody,
}

impl WireResponse {
    fn json(value: Value) -> Self {
        Self { status: 200, body: WireBody::Json(value) }
    }

    fn text(status: u16, text: &'static str) -> Self {
        Self { status, body: WireBody::Text(text) }
    }
}

pub fn encode(outcome: &DispatchOutcome) -> WireResponse {
    match outcome {
        DispatchOutcome::Pong => {
            WireResponse::json(json!({ "type": InteractionResponseType::Pong.code() }))
        }
        DispatchOutcome::Message(content) => WireResponse::json(json!({
            "type": InteractionResponseType::ChannelMessageWithSource.code(),
            "data": { "content": content },
        })),
        DispatchOutcome::Deferred => WireResponse::json(json!({
            "type": InteractionResponseType::DeferredChannelMessageWithSource.code(),
        })),
        DispatchOutcome::NotFound { .. } => WireResponse::text(404, "Command not found"),
        DispatchOutcome::Ignored { .. } => WireResponse { status: 204, body: WireBody::Empty },
    }
}

/// Rejections carry fixed diagnostic text only; verification inputs never
/// reach the response body.
pub fn encode_error(error: &DispatchError) -> WireResponse {
    match error {
        DispatchError::MissingSignature => WireResponse::text(401, "Signature not found"),
        DispatchError::MissingTimestamp => WireResponse::text(401, "Timestamp not found"),
        DispatchError::InvalidSignature => WireResponse::text(401, "Unable to verify"),
        DispatchError::MalformedEnvelope(_) => {
            WireResponse::text(500, "Invalid interaction payload")
        }
    }
}
