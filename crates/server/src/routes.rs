use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tether_discord::{DiscordRestClient, InteractionDispatcher};

use crate::bootstrap::Application;
use crate::{health, interactions, message};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<InteractionDispatcher>,
    pub rest: DiscordRestClient,
}

impl From<&Application> for AppState {
    fn from(app: &Application) -> Self {
        Self { dispatcher: app.dispatcher.clone(), rest: app.rest.clone() }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/interactions", post(interactions::interactions))
        .route("/message", post(message::message))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
