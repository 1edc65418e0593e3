use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use precinct_store::PgStore;
use precinct_sync::{build_scheduler, OrgRegistry, SyncService, SyncSettings};

#[derive(Debug, Parser)]
#[command(name = "precinct-cli")]
#[command(about = "Precinct community sync command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one sync pass for one or all enabled organizations.
    Sync {
        #[arg(long)]
        org: Option<String>,
    },
    /// Apply database migrations.
    Migrate,
    /// Start the web API, plus the interval scheduler when enabled.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("precinct_sync=info".parse().expect("valid directive"))
                .add_directive("precinct_store=info".parse().expect("valid directive"))
                .add_directive("precinct_web=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync { org: None }) {
        Commands::Sync { org } => {
            let results = precinct_sync::run_sync_once_from_env(org.as_deref()).await?;
            for (organization, result) in results {
                match result.stats {
                    Some(stats) => println!(
                        "sync complete: org={} citizens(created={} updated={} errors={}) vehicles(created={} updated={} errors={})",
                        organization,
                        stats.citizens.created,
                        stats.citizens.updated,
                        stats.citizens.errors,
                        stats.vehicles.created,
                        stats.vehicles.updated,
                        stats.vehicles.errors,
                    ),
                    None => println!(
                        "sync failed: org={} error={}",
                        organization,
                        result.error.as_deref().unwrap_or("unknown"),
                    ),
                }
            }
        }
        Commands::Migrate => {
            let settings = SyncSettings::from_env();
            let store = PgStore::connect(&settings.database_url)
                .await
                .context("connecting to database")?;
            store.migrate().await.context("applying migrations")?;
            println!("migrations applied");
        }
        Commands::Serve => {
            let settings = SyncSettings::from_env();
            let _scheduler = if settings.scheduler_enabled {
                let registry = OrgRegistry::load(&settings.registry_path).await?;
                let store = PgStore::connect(&settings.database_url)
                    .await
                    .context("connecting to database")?;
                let service = Arc::new(SyncService::new(settings.clone(), Arc::new(store))?);
                match build_scheduler(service, &registry).await? {
                    Some(scheduler) => {
                        scheduler.start().await.context("starting scheduler")?;
                        tracing::info!("interval scheduler started");
                        Some(scheduler)
                    }
                    None => None,
                }
            } else {
                None
            };
            precinct_web::serve_from_env().await?;
        }
    }

    Ok(())
}
