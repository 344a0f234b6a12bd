use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub commands: HealthCheck,
    pub pending_deliveries: usize,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let registry = state.dispatcher.registry();
    let commands = if registry.is_sealed() && !registry.is_empty() {
        HealthCheck { status: "ready", detail: format!("{} command(s) registered", registry.len()) }
    } else {
        HealthCheck { status: "degraded", detail: "no commands available for dispatch".to_string() }
    };
    let ready = commands.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "tether-server runtime initialized".to_string(),
        },
        commands,
        pending_deliveries: state.dispatcher.responder().pending_deliveries(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use tether_core::config::DiscordConfig;
    use tether_discord::{
        default_registry, CommandRegistry, DeferredResponder, DiscordRestClient,
        InteractionDispatcher, RetrySchedule, SignatureVerifier,
    };

    use crate::health::health;
    use crate::routes::AppState;

    fn state(registry: CommandRegistry) -> AppState {
        let rest = DiscordRestClient::new(&DiscordConfig {
            public_key: "ab".repeat(32),
            application_id: "1".to_owned(),
            api_base_url: "http://127.0.0.1:9".to_owned(),
            bot_token: None,
            channel_id: None,
            request_timeout_secs: 10,
        })
        .expect("rest client");
        let responder =
            Arc::new(DeferredResponder::new(Arc::new(rest.clone()), RetrySchedule::default()));
        let dispatcher = Arc::new(InteractionDispatcher::new(
            SignatureVerifier::new("ab".repeat(32)),
            registry,
            responder,
        ));
        AppState { dispatcher, rest }
    }

    #[tokio::test]
    async fn health_is_ready_with_the_default_registry() {
        let (status, Json(payload)) =
            health(State(state(default_registry().expect("registry")))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.commands.detail, "1 command(s) registered");
        assert_eq!(payload.pending_deliveries, 0);
    }

    #[tokio::test]
    async fn health_is_degraded_without_commands() {
        let (status, Json(payload)) = health(State(state(CommandRegistry::new()))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
