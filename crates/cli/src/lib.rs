pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "tether",
    about = "Tether Discord bot operator CLI",
    long_about = "Operate the Tether Discord bot from the command line.",
    after_help = "Examples:\n  tether register\n  tether message \"deploy finished\" --channel 1234567890\n  tether config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Register every built-in slash command with Discord")]
    Register,
    #[command(about = "Post a message to a channel using the bot token")]
    Message {
        #[arg(help = "Message content to post")]
        content: String,
        #[arg(long, help = "Target channel id (defaults to discord.channel_id)")]
        channel: Option<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Register => commands::register::run(),
        Command::Message { content, channel } => {
            commands::message::run(&content, channel.as_deref())
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
