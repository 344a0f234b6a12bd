use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    commands::{CommandRegistry, CommandReply},
    deferred::DeferredResponder,
    verify::SignatureVerifier,
};

pub const INTERACTION_TYPE_PING: u64 = 1;
pub const INTERACTION_TYPE_APPLICATION_COMMAND: u64 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundInteraction {
    pub id: Option<String>,
    pub kind: InteractionKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    ApplicationCommand { command_name: String, continuation_token: String },
    Other { interaction_type: u64 },
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    interaction_type: u64,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    data: Option<RawInteractionData>,
}

#[derive(Debug, Deserialize)]
struct RawInteractionData {
    #[serde(default)]
    name: Option<String>,
}

impl InboundInteraction {
    pub fn decode(raw_body: &[u8]) -> Result<Self, DispatchError> {
        let raw: RawInteraction = serde_json::from_slice(raw_body)
            .map_err(|error| DispatchError::MalformedEnvelope(error.to_string()))?;

        let kind = match raw.interaction_type {
            INTERACTION_TYPE_PING => InteractionKind::Ping,
            INTERACTION_TYPE_APPLICATION_COMMAND => {
                let command_name = raw.data.and_then(|data| data.name).ok_or_else(|| {
                    DispatchError::MalformedEnvelope("command interaction without data.name".into())
                })?;
                let continuation_token = raw.token.ok_or_else(|| {
                    DispatchError::MalformedEnvelope("command interaction without token".into())
                })?;
                InteractionKind::ApplicationCommand { command_name, continuation_token }
            }
            other => InteractionKind::Other { interaction_type: other },
        };

        Ok(Self { id: raw.id, kind })
    }

    fn correlation_id(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }
}

/// The transport-independent view of one POST to the interactions endpoint.
#[derive(Clone, Copy, Debug)]
pub struct InboundRequest<'a> {
    pub signature: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Pong,
    Message(String),
    Deferred,
    NotFound { command_name: String },
    /// Interaction types this bot does not handle. Answered with no body.
    Ignored { interaction_type: u64 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("missing timestamp header")]
    MissingTimestamp,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("malformed interaction envelope: {0}")]
    MalformedEnvelope(String),
}

impl DispatchError {
    pub fn is_trust_failure(&self) -> bool {
        !matches!(self, Self::MalformedEnvelope(_))
    }
}

pub struct InteractionDispatcher {
    verifier: SignatureVerifier,
    registry: CommandRegistry,
    responder: Arc<DeferredResponder>,
}

impl InteractionDispatcher {
    /// Takes ownership of the registry and seals it; no command can be added
    /// once dispatching is possible.
    pub fn new(
        verifier: SignatureVerifier,
        mut registry: CommandRegistry,
        responder: Arc<DeferredResponder>,
    ) -> Self {
        registry.seal();
        Self { verifier, registry, responder }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn responder(&self) -> &Arc<DeferredResponder> {
        &self.responder
    }

    pub fn dispatch(&self, request: &InboundRequest<'_>) -> Result<DispatchOutcome, DispatchError> {
        let Some(signature) = request.signature.filter(|value| !value.is_empty()) else {
            warn!(
                event_name = "ingress.discord.rejected",
                reason = "missing_signature",
                "interaction rejected: signature header not found"
            );
            return Err(DispatchError::MissingSignature);
        };
        let Some(timestamp) = request.timestamp.filter(|value| !value.is_empty()) else {
            warn!(
                event_name = "ingress.discord.rejected",
                reason = "missing_timestamp",
                "interaction rejected: timestamp header not found"
            );
            return Err(DispatchError::MissingTimestamp);
        };

        if !self.verifier.verify(signature, timestamp, request.body) {
            warn!(
                event_name = "ingress.discord.rejected",
                reason = "invalid_signature",
                public_key = %self.verifier.public_key(),
                signature = %signature,
                timestamp = %timestamp,
                raw_body = %String::from_utf8_lossy(request.body),
                "interaction rejected: failed to verify signature"
            );
            return Err(DispatchError::InvalidSignature);
        }

        let interaction = InboundInteraction::decode(request.body).map_err(|decode_error| {
            error!(
                event_name = "ingress.discord.malformed",
                error = %decode_error,
                raw_body = %String::from_utf8_lossy(request.body),
                "verified interaction could not be decoded"
            );
            decode_error
        })?;

        Ok(self.route(interaction))
    }

    /// Routes an already verified and decoded interaction.
    pub fn route(&self, interaction: InboundInteraction) -> DispatchOutcome {
        let correlation_id = interaction.correlation_id().to_owned();

        match interaction.kind {
            InteractionKind::Ping => {
                debug!(
                    event_name = "ingress.discord.ping",
                    correlation_id = %correlation_id,
                    "answering interaction ping"
                );
                DispatchOutcome::Pong
            }
            InteractionKind::ApplicationCommand { command_name, continuation_token } => {
                let Some(command) = self.registry.lookup(&command_name) else {
                    debug!(
                        event_name = "ingress.discord.command_not_found",
                        correlation_id = %correlation_id,
                        command = %command_name,
                        "no handler registered for command"
                    );
                    return DispatchOutcome::NotFound { command_name };
                };

                match command.invoke() {
                    CommandReply::Immediate(content) => {
                        info!(
                            event_name = "ingress.discord.command_answered",
                            correlation_id = %correlation_id,
                            command = %command_name,
                            "command answered immediately"
                        );
                        DispatchOutcome::Message(content)
                    }
                    CommandReply::Pending(pending) => {
                        info!(
                            event_name = "ingress.discord.command_deferred",
                            correlation_id = %correlation_id,
                            command = %command_name,
                            "command deferred; delivering result in background"
                        );
                        self.responder.deliver(continuation_token, pending, correlation_id);
                        DispatchOutcome::Deferred
                    }
                }
            }
            InteractionKind::Other { interaction_type } => {
                debug!(
                    event_name = "ingress.discord.ignored",
                    correlation_id = %correlation_id,
                    interaction_type,
                    "ignoring unsupported interaction type"
                );
                DispatchOutcome::Ignored { interaction_type }
            }
        }
    }
}
