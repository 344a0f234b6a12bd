use std::sync::Arc;

use tether_core::config::AppConfig;
use tether_discord::{
    default_registry, DeferredResponder, DiscordRestClient, InteractionDispatcher, RegistryError,
    RestError, RetrySchedule, SignatureVerifier,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<InteractionDispatcher>,
    pub rest: DiscordRestClient,
}

impl Application {
    pub fn responder(&self) -> &Arc<DeferredResponder> {
        self.dispatcher.responder()
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("command registry setup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("discord http client setup failed: {0}")]
    HttpClient(#[from] RestError),
}

pub fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let rest = DiscordRestClient::new(&config.discord)?;
    let responder = Arc::new(DeferredResponder::new(
        Arc::new(rest.clone()),
        RetrySchedule::from_secs(&config.delivery.retry_delays_secs),
    ));

    let registry = default_registry()?;
    let command_count = registry.len();
    let dispatcher = Arc::new(InteractionDispatcher::new(
        SignatureVerifier::new(config.discord.public_key.clone()),
        registry,
        responder,
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        commands = command_count,
        max_delivery_attempts = dispatcher.responder().schedule().max_attempts(),
        api_base = %rest.api_base(),
        "interaction dispatcher ready"
    );

    Ok(Application { config, dispatcher, rest })
}
