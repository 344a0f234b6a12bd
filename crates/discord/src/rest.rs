use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use tether_core::config::DiscordConfig;
use thiserror::Error;
use tracing::{info, warn};

use crate::commands::CommandRegistry;
use crate::deferred::{FollowupError, FollowupTransport};

#[derive(Debug, Error)]
pub enum RestError {
    #[error("could not build http client: {0}")]
    ClientBuild(String),
    #[error("discord bot token is not configured")]
    MissingBotToken,
    #[error("no channel given and discord.channel_id is not configured")]
    MissingChannel,
    #[error("discord request failed: {0}")]
    Request(String),
    #[error("discord returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandRegistration {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub results: Vec<CommandRegistration>,
    pub all_ok: bool,
}

/// Outbound Discord HTTP API calls. Also serves as the follow-up transport for
/// deferred replies.
#[derive(Clone)]
pub struct DiscordRestClient {
    client: Client,
    api_base: String,
    application_id: String,
    bot_token: Option<SecretString>,
    default_channel_id: Option<String>,
}

impl std::fmt::Debug for DiscordRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRestClient")
            .field("api_base", &self.api_base)
            .field("application_id", &self.application_id)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("default_channel_id", &self.default_channel_id)
            .finish()
    }
}

impl DiscordRestClient {
    /// Builds a client whose requests give up after
    /// `discord.request_timeout_secs`.
    pub fn new(config: &DiscordConfig) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| RestError::ClientBuild(error.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &DiscordConfig) -> Self {
        Self {
            client,
            api_base: config.api_base_url.trim_end_matches('/').to_owned(),
            application_id: config.application_id.clone(),
            bot_token: config.bot_token.clone(),
            default_channel_id: config.channel_id.clone(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn edit_original_url(&self, continuation_token: &str) -> String {
        format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.api_base, self.application_id, continuation_token
        )
    }

    pub fn channel_messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel_id)
    }

    pub fn application_commands_url(&self) -> String {
        format!("{}/applications/{}/commands", self.api_base, self.application_id)
    }

    /// Posts `content` to `channel_id`, or the configured default channel, and
    /// returns the raw response text.
    pub async fn send_message(
        &self,
        content: &str,
        channel_id: Option<&str>,
    ) -> Result<String, RestError> {
        let channel_id = channel_id
            .or(self.default_channel_id.as_deref())
            .filter(|value| !value.trim().is_empty())
            .ok_or(RestError::MissingChannel)?;

        let request = self
            .authorized(self.client.post(self.channel_messages_url(channel_id)))?
            .json(&json!({ "content": content }));
        let body = send_expecting_success(request).await?;

        info!(
            event_name = "egress.discord.message_sent",
            channel_id = %channel_id,
            "message posted to channel"
        );
        Ok(body)
    }

    pub async fn register_command(&self, name: &str, description: &str) -> Result<(), RestError> {
        let request = self
            .authorized(self.client.post(self.application_commands_url()))?
            .json(&json!({ "name": name, "description": description }));
        send_expecting_success(request).await?;
        Ok(())
    }

    /// Registers every command in the registry, one request each. A failure
    /// for one command does not stop the others.
    pub async fn register_commands(&self, registry: &CommandRegistry) -> RegistrationReport {
        let mut results = Vec::with_capacity(registry.len());

        for command in registry.commands() {
            let outcome = self.register_command(command.name(), command.description()).await;
            match outcome {
                Ok(()) => {
                    info!(
                        event_name = "egress.discord.command_registered",
                        command = %command.name(),
                        "slash command registered"
                    );
                    results.push(CommandRegistration {
                        name: command.name().to_owned(),
                        ok: true,
                        error: None,
                    });
                }
                Err(error) => {
                    warn!(
                        event_name = "egress.discord.command_registration_failed",
                        command = %command.name(),
                        error = %error,
                        "slash command registration failed"
                    );
                    results.push(CommandRegistration {
                        name: command.name().to_owned(),
                        ok: false,
                        error: Some(error.to_string()),
                    });
                }
            }
        }

        let all_ok = results.iter().all(|result| result.ok);
        RegistrationReport { results, all_ok }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, RestError> {
        let token = self
            .bot_token
            .as_ref()
            .map(|token| token.expose_secret())
            .filter(|token| !token.trim().is_empty())
            .ok_or(RestError::MissingBotToken)?;
        Ok(request.header("Authorization", format!("Bot {token}")))
    }
}

async fn send_expecting_success(request: RequestBuilder) -> Result<String, RestError> {
    let response =
        request.send().await.map_err(|error| RestError::Request(error.to_string()))?;
    let status = response.status();
    let body = response.text().await.map_err(|error| RestError::Request(error.to_string()))?;

    if !status.is_success() {
        return Err(RestError::Status { status: status.as_u16(), body });
    }
    Ok(body)
}

#[async_trait]
impl FollowupTransport for DiscordRestClient {
    async fn edit_original(
        &self,
        continuation_token: &str,
        content: &str,
    ) -> Result<(), FollowupError> {
        let response = self
            .client
            .patch(self.edit_original_url(continuation_token))
            .header(CONTENT_TYPE, "application/json")
            .body(json!({ "content": content }).to_string())
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    FollowupError::Request(format!("timed out: {error}"))
                } else {
                    FollowupError::Request(error.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(FollowupError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tether_core::config::DiscordConfig;

    use super::{DiscordRestClient, RestError};

    fn config(api_base_url: &str) -> DiscordConfig {
        DiscordConfig {
            public_key: "ab".repeat(32),
            application_id: "123456".to_owned(),
            api_base_url: api_base_url.to_owned(),
            bot_token: None,
            channel_id: None,
            request_timeout_secs: 10,
        }
    }

    #[test]
    fn builds_endpoint_urls_without_double_slashes() {
        let client =
            DiscordRestClient::new(&config("https://discord.test/api/v10/")).expect("client");

        assert_eq!(client.api_base(), "https://discord.test/api/v10");
        assert_eq!(
            client.edit_original_url("tok"),
            "https://discord.test/api/v10/webhooks/123456/tok/messages/@original"
        );
        assert_eq!(
            client.channel_messages_url("42"),
            "https://discord.test/api/v10/channels/42/messages"
        );
        assert_eq!(
            client.application_commands_url(),
            "https://discord.test/api/v10/applications/123456/commands"
        );
    }

    #[tokio::test]
    async fn send_message_requires_channel_and_token_before_any_request() {
        let client = DiscordRestClient::new(&config("http://127.0.0.1:9")).expect("client");

        let no_channel = client.send_message("hi", None).await;
        assert!(matches!(no_channel, Err(RestError::MissingChannel)));

        let no_token = client.send_message("hi", Some("42")).await;
        assert!(matches!(no_token, Err(RestError::MissingBotToken)));
    }

    #[test]
    fn debug_output_redacts_the_bot_token() {
        let mut config = config("https://discord.test/api/v10");
        config.bot_token = Some("super-secret-token".to_owned().into());
        let client = DiscordRestClient::new(&config).expect("client");

        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
