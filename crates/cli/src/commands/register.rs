use tether_discord::default_registry;

use crate::commands::{
    build_client, build_runtime, load_config, CommandResult, EXIT_CONFIG, EXIT_DISCORD_API,
    EXIT_RUNTIME,
};

pub fn run() -> CommandResult {
    let config = match load_config("register") {
        Ok(config) => config,
        Err(result) => return result,
    };
    if config.discord.bot_token().is_none() {
        return CommandResult::failure(
            "register",
            "config_validation",
            "discord.bot_token is required to register commands (set DISCORD_BOT_TOKEN)",
            EXIT_CONFIG,
        );
    }

    let registry = match default_registry() {
        Ok(registry) => registry,
        Err(error) => {
            return CommandResult::failure("register", "registry", error.to_string(), EXIT_RUNTIME);
        }
    };

    let runtime = match build_runtime("register") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let client = match build_client("register", &config.discord) {
        Ok(client) => client,
        Err(result) => return result,
    };
    let report = runtime.block_on(client.register_commands(&registry));

    if report.all_ok {
        let names: Vec<&str> = report.results.iter().map(|result| result.name.as_str()).collect();
        return CommandResult::success(
            "register",
            format!("registered {} command(s): {}", names.len(), names.join(", ")),
        );
    }

    let failures: Vec<String> = report
        .results
        .iter()
        .filter(|result| !result.ok)
        .map(|result| {
            format!("{} ({})", result.name, result.error.as_deref().unwrap_or("unknown error"))
        })
        .collect();
    CommandResult::failure(
        "register",
        "discord_api",
        format!(
            "{} of {} command(s) failed to register: {}",
            failures.len(),
            report.results.len(),
            failures.join("; ")
        ),
        EXIT_DISCORD_API,
    )
}
