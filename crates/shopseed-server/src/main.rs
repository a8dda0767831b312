use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shopseed_server::config::ServerConfig;
use shopseed_server::error::ServerError;
use shopseed_server::logging::init_logging;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "shopseed", version, about = "Seed an e-commerce database with generated data")]
struct Cli {
    /// Optional TOML config file; environment variables override it.
    #[arg(long, global = true, env = "SHOPSEED_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Apply the database schema and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => shopseed_server::serve(config).await,
        Command::Migrate => {
            shopseed_server::migrate(config).await?;
            info!(event = "migration_finished");
            Ok(())
        }
    }
}
