use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tether_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let bot_token = if config.discord.bot_token().is_some() { "<redacted>" } else { "<unset>" };
    let retry_delays = config
        .delivery
        .retry_delays_secs
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let fields = vec![
        field(
            "discord.public_key",
            config.discord.public_key.clone(),
            &["TETHER_DISCORD_PUBLIC_KEY", "DISCORD_PUBLIC_KEY"],
        ),
        field(
            "discord.application_id",
            config.discord.application_id.clone(),
            &["TETHER_DISCORD_APPLICATION_ID", "DISCORD_APP_ID"],
        ),
        field(
            "discord.api_base_url",
            config.discord.api_base_url.clone(),
            &["TETHER_DISCORD_API_BASE_URL", "DISCORD_API_URL"],
        ),
        field(
            "discord.bot_token",
            bot_token.to_string(),
            &["TETHER_DISCORD_BOT_TOKEN", "DISCORD_BOT_TOKEN"],
        ),
        field(
            "discord.channel_id",
            config.discord.channel_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["TETHER_DISCORD_CHANNEL_ID", "DISCORD_CHANNEL_ID"],
        ),
        field(
            "discord.request_timeout_secs",
            config.discord.request_timeout_secs.to_string(),
            &["TETHER_DISCORD_REQUEST_TIMEOUT_SECS"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["TETHER_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["TETHER_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["TETHER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "delivery.retry_delays_secs",
            format!("[{retry_delays}]"),
            &["TETHER_DELIVERY_RETRY_DELAYS_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["TETHER_LOGGING_LEVEL", "TETHER_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TETHER_LOGGING_FORMAT", "TETHER_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

type Field = (&'static str, String, &'static [&'static str]);

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    (key, value, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("tether.toml"), PathBuf::from("config/tether.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys
        .iter()
        .find(|env_key| env::var(env_key).is_ok_and(|value| !value.trim().is_empty()))
    {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
