use tether_discord::RestError;

use crate::commands::{
    build_client, build_runtime, load_config, CommandResult, EXIT_CONFIG, EXIT_DISCORD_API,
    EXIT_INVALID_INPUT,
};

pub fn run(content: &str, channel: Option<&str>) -> CommandResult {
    if content.trim().is_empty() {
        return CommandResult::failure(
            "message",
            "invalid_input",
            "message content must not be empty",
            EXIT_INVALID_INPUT,
        );
    }

    let config = match load_config("message") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("message") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let client = match build_client("message", &config.discord) {
        Ok(client) => client,
        Err(result) => return result,
    };
    match runtime.block_on(client.send_message(content, channel)) {
        Ok(response) => CommandResult::success("message", response),
        Err(error @ (RestError::MissingBotToken | RestError::MissingChannel)) => {
            CommandResult::failure("message", "config_validation", error.to_string(), EXIT_CONFIG)
        }
        Err(error) => {
            CommandResult::failure("message", "discord_api", error.to_string(), EXIT_DISCORD_API)
        }
    }
}
