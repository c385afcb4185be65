use agentflow::adapters::PostgresLedger;
use agentflow::cli::{Cli, Commands};
use agentflow::config::AppConfig;
use agentflow::logging::{init_logging, init_logging_simple};
use agentflow::runtime;
use anyhow::{bail, Context};
use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("loading configuration from {}", cli.config_dir))?;
    if cli.dry_run {
        config.dry_run.enabled = true;
    }

    match &cli.command {
        Commands::Migrate => {
            init_logging_simple();
            let url = config
                .database
                .url
                .as_deref()
                .context("database.url is not configured")?;
            let ledger = PostgresLedger::new(url, config.database.max_connections).await?;
            ledger.migrate().await?;
            println!("Migrations applied");
        }
        Commands::Cycle { agent } => {
            init_logging(&config.logging);
            validate(&config)?;
            let runtime = runtime::build(&config).await?;
            let outcome = runtime.pipeline.run_cycle(agent).await?;
            info!(agent = %agent, outcome = outcome.label(), "cycle complete");
            println!("{}: {:?}", agent, outcome);
            runtime.drain().await;
        }
        Commands::Run => {
            init_logging(&config.logging);
            validate(&config)?;
            let runtime = runtime::build(&config).await?;
            info!(dry_run = config.dry_run.enabled, "agentflow starting");

            runtime
                .pipeline
                .run_scheduler(
                    Duration::from_secs(config.scheduler.interval_secs.max(1)),
                    config.scheduler.max_concurrent_agents,
                    async {
                        if let Err(e) = signal::ctrl_c().await {
                            error!(error = %e, "failed to listen for shutdown signal");
                        }
                    },
                )
                .await;
            runtime.drain().await;
            info!("agentflow stopped");
        }
    }

    Ok(())
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {}", e);
        }
        bail!("invalid configuration ({} problems)", errors.len());
    }
    Ok(())
}
