use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedtrack::app::AppContext;
use feedtrack::cli::{commands, Cli, Commands};
use feedtrack::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.store.path = Some(db);
    }
    if let Some(domain) = cli.domain {
        config.store.domain = domain;
    }
    if let Some(workers) = cli.workers {
        config.consumer.workers = workers;
    }

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Track { id, seen_at } => {
            commands::track(&ctx, &id, seen_at.as_deref())?;
        }
        Commands::Claim { id } => {
            commands::claim(&ctx, &id)?;
        }
        Commands::Consumed { id } => {
            commands::consumed(&ctx, &id)?;
        }
        Commands::Fail { id, abort } => {
            commands::fail(&ctx, &id, abort)?;
        }
        Commands::Status { id } => {
            commands::status(&ctx, &id)?;
        }
        Commands::Pending => {
            commands::list_pending(&ctx)?;
        }
        Commands::Stats => {
            commands::stats(&ctx)?;
        }
        Commands::Check => {
            commands::check(&ctx)?;
        }
        Commands::Consume {
            max_retries,
            command,
        } => {
            let max_retries = max_retries.unwrap_or(ctx.config.consumer.max_retries);
            commands::consume(&ctx, ctx.config.consumer.workers, max_retries, &command).await?;
        }
    }

    Ok(())
}
