use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::config::{Cli, Command};
use services::{AppServices, Clock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Open + migrate SQLite at startup for both subcommands.
    let services = AppServices::new_sqlite(&cli.db_url, Clock::default())
        .await
        .with_context(|| format!("failed to open database {}", cli.db_url))?;

    match cli.command() {
        Command::Serve => app::serve(services, cli.bind).await,
        Command::Seed => {
            for seeded in app::seed(&services).await? {
                match seeded.token {
                    Some(token) => println!(
                        "created {} ({}): token {}",
                        seeded.username,
                        seeded.role.as_str(),
                        token.as_str()
                    ),
                    None => println!("exists  {} ({})", seeded.username, seeded.role.as_str()),
                }
            }
            Ok(())
        }
    }
}
