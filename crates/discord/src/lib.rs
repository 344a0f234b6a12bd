//! Discord Integration - signed interaction webhook bot interface
//!
//! This crate provides the Discord interface for tether:
//! - **Verification** (`verify`) - Ed25519 check of `x-signature-*` headers over the raw body
//! - **Commands** (`commands`) - Slash command registry, sealed before dispatch begins
//! - **Interactions** (`interactions`) - Envelope decoding, classification and routing
//! - **Deferred delivery** (`deferred`) - Follow-up edits with bounded retries
//! - **Responses** (`response`) - Interaction response wire envelopes
//! - **REST** (`rest`) - Outbound calls to the Discord HTTP API
//!
//! # Getting Started
//!
//! 1. Create an application at https://discord.com/developers/applications
//! 2. Point its Interactions Endpoint URL at `https://<host>/interactions`
//! 3. Set env vars: `DISCORD_PUBLIC_KEY`, `DISCORD_APP_ID` (and `DISCORD_BOT_TOKEN` for the CLI)
//! 4. Run `tether register` once to publish the slash commands
//!
//! # Architecture
//!
//! ```text
//! POST /interactions → SignatureVerifier → InteractionDispatcher → CommandRegistry
//!                                               ↓                        ↓
//!                              response::encode ← outcome      CommandReply::Pending
//!                                                                        ↓
//!                                       DeferredResponder → PATCH .../messages/@original
//! ```

pub mod commands;
pub mod deferred;
pub mod interactions;
pub mod response;
pub mod rest;
pub mod verify;

pub use commands::{
    default_registry, Command, CommandReply, CommandRegistry, HandlerError, RegistryError,
};
pub use deferred::{
    DeferredResponder, DeliveryOutcome, FollowupError, FollowupTransport, RetrySchedule,
};
pub use interactions::{
    DispatchError, DispatchOutcome, InboundInteraction, InboundRequest, InteractionDispatcher,
};
pub use response::{encode, encode_error, WireBody, WireResponse};
pub use rest::{CommandRegistration, DiscordRestClient, RegistrationReport, RestError};
pub use verify::{SignatureVerifier, VerificationMaterial};
