use std::process::ExitCode;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tether_cli::run()
}
