use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [1, 5, 10];
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const MAX_RETRY_STEPS: usize = 10;
const MAX_RETRY_DELAY_SECS: u64 = 300;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub server: ServerConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    /// Hex-encoded Ed25519 application public key used to verify interactions.
    pub public_key: String,
    pub application_id: String,
    pub api_base_url: String,
    /// Only needed for outbound calls that act as the bot user.
    pub bot_token: Option<SecretString>,
    pub channel_id: Option<String>,
    /// Upper bound on each outbound HTTP call, connect through response body.
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub retry_delays_secs: Vec<u64>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub public_key: Option<String>,
    pub application_id: Option<String>,
    pub api_base_url: Option<String>,
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub retry_delays_secs: Option<Vec<u64>>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                public_key: String::new(),
                application_id: String::new(),
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                bot_token: None,
                channel_id: None,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            delivery: DeliveryConfig { retry_delays_secs: DEFAULT_RETRY_DELAYS_SECS.to_vec() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl DiscordConfig {
    pub fn bot_token(&self) -> Option<&str> {
        self.bot_token
            .as_ref()
            .map(|token| token.expose_secret())
            .filter(|token| !token.trim().is_empty())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tether.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(public_key) = discord.public_key {
                self.discord.public_key = public_key;
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = application_id;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = Some(secret_value(bot_token_value));
            }
            if let Some(channel_id) = discord.channel_id {
                self.discord.channel_id = Some(channel_id);
            }
            if let Some(request_timeout_secs) = discord.request_timeout_secs {
                self.discord.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(delivery) = patch.delivery {
            if let Some(retry_delays_secs) = delivery.retry_delays_secs {
                self.delivery.retry_delays_secs = retry_delays_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_any(&["TETHER_DISCORD_PUBLIC_KEY", "DISCORD_PUBLIC_KEY"]) {
            self.discord.public_key = value;
        }
        if let Some(value) = read_env_any(&["TETHER_DISCORD_APPLICATION_ID", "DISCORD_APP_ID"]) {
            self.discord.application_id = value;
        }
        if let Some(value) = read_env_any(&["TETHER_DISCORD_API_BASE_URL", "DISCORD_API_URL"]) {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env_any(&["TETHER_DISCORD_BOT_TOKEN", "DISCORD_BOT_TOKEN"]) {
            self.discord.bot_token = Some(secret_value(value));
        }
        if let Some(value) = read_env_any(&["TETHER_DISCORD_CHANNEL_ID", "DISCORD_CHANNEL_ID"]) {
            self.discord.channel_id = Some(value);
        }
        if let Some(value) = read_env("TETHER_DISCORD_REQUEST_TIMEOUT_SECS") {
            self.discord.request_timeout_secs =
                parse_u64("TETHER_DISCORD_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TETHER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TETHER_SERVER_PORT") {
            self.server.port = parse_u16("TETHER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TETHER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TETHER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TETHER_DELIVERY_RETRY_DELAYS_SECS") {
            self.delivery.retry_delays_secs =
                parse_u64_list("TETHER_DELIVERY_RETRY_DELAYS_SECS", &value)?;
        }

        if let Some(value) = read_env_any(&["TETHER_LOGGING_LEVEL", "TETHER_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some(value) = read_env_any(&["TETHER_LOGGING_FORMAT", "TETHER_LOG_FORMAT"]) {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(public_key) = overrides.public_key {
            self.discord.public_key = public_key;
        }
        if let Some(application_id) = overrides.application_id {
            self.discord.application_id = application_id;
        }
        if let Some(api_base_url) = overrides.api_base_url {
            self.discord.api_base_url = api_base_url;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.discord.bot_token = Some(secret_value(bot_token));
        }
        if let Some(channel_id) = overrides.channel_id {
            self.discord.channel_id = Some(channel_id);
        }
        if let Some(request_timeout_secs) = overrides.request_timeout_secs {
            self.discord.request_timeout_secs = request_timeout_secs;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(retry_delays_secs) = overrides.retry_delays_secs {
            self.delivery.retry_delays_secs = retry_delays_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_server(&self.server)?;
        validate_delivery(&self.delivery)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tether.toml"), PathBuf::from("config/tether.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let public_key = discord.public_key.trim();
    if public_key.is_empty() {
        return Err(ConfigError::Validation(
            "discord.public_key is required. Find it under https://discord.com/developers/applications > Your App > General Information > Public Key".to_string(),
        ));
    }
    if public_key.len() != 64 || !public_key.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(ConfigError::Validation(
            "discord.public_key must be 64 hex characters (a 32-byte Ed25519 key)".to_string(),
        ));
    }

    let application_id = discord.application_id.trim();
    if application_id.is_empty() {
        return Err(ConfigError::Validation(
            "discord.application_id is required. Find it under https://discord.com/developers/applications > Your App > General Information > Application ID".to_string(),
        ));
    }
    if !application_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ConfigError::Validation(
            "discord.application_id must be a numeric snowflake".to_string(),
        ));
    }

    let base_url = discord.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if let Some(channel_id) = &discord.channel_id {
        if !channel_id.trim().bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(ConfigError::Validation(
                "discord.channel_id must be a numeric snowflake".to_string(),
            ));
        }
    }

    if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&discord.request_timeout_secs) {
        return Err(ConfigError::Validation(format!(
            "discord.request_timeout_secs must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_delivery(delivery: &DeliveryConfig) -> Result<(), ConfigError> {
    if delivery.retry_delays_secs.len() > MAX_RETRY_STEPS {
        return Err(ConfigError::Validation(format!(
            "delivery.retry_delays_secs allows at most {MAX_RETRY_STEPS} entries"
        )));
    }

    if delivery.retry_delays_secs.iter().any(|delay| *delay > MAX_RETRY_DELAY_SECS) {
        return Err(ConfigError::Validation(format!(
            "delivery.retry_delays_secs entries must be at most {MAX_RETRY_DELAY_SECS}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64_list(key: &str, value: &str) -> Result<Vec<u64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_u64(key, part))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    server: Option<ServerPatch>,
    delivery: Option<DeliveryPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    public_key: Option<String>,
    application_id: Option<String>,
    api_base_url: Option<String>,
    bot_token: Option<String>,
    channel_id: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DeliveryPatch {
    retry_delays_secs: Option<Vec<u64>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
