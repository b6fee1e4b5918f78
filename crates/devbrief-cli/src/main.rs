mod brief;
mod collect;
mod daemon;
mod trends;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "devbrief")]
#[command(about = "Daily developer-community briefing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Fetch repositories and forum content and store today's snapshots
    Collect {
        /// Fetch and summarise without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the trend report built from stored snapshots
    Trends {
        /// Show a single repository (owner/name)
        #[arg(long)]
        entity: Option<String>,
    },
    /// Generate, review and store today's briefing
    Brief {
        /// Print the first generation prompt instead of calling the LLM
        #[arg(long)]
        dry_run: bool,
        /// Where to write the final markdown (defaults to DEVBRIEF_REPORT_PATH)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run collect and brief on DEVBRIEF_SCHEDULE_CRON until interrupted
    Daemon,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("devbrief: no command given; see `devbrief --help`");
        return Ok(());
    };

    let config = Arc::new(devbrief_core::load_app_config_from_env()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = devbrief_db::PoolConfig::from_app_config(&config);
    let pool = devbrief_db::connect_pool(&config.database_url, pool_config)
        .await
        .context("failed to connect to database")?;

    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Collect { dry_run } => collect::run_collect(&pool, &config, "cli", dry_run).await,
        Commands::Trends { entity } => trends::run_trends(&pool, &config, entity.as_deref()).await,
        Commands::Brief { dry_run, output } => {
            let cancel = CancellationToken::new();
            let watcher = tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    daemon::shutdown_signal().await;
                    cancel.cancel();
                }
            });
            let options = brief::BriefOptions {
                dry_run,
                output,
                trigger: "cli",
            };
            let result = brief::run_brief(&pool, &config, &options, &cancel).await;
            watcher.abort();
            result
        }
        Commands::Daemon => daemon::run_daemon(pool, config).await,
    }
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            devbrief_db::ping(pool).await?;
            println!("database reachable");
        }
        DbCommands::Migrate => {
            let applied = devbrief_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

/// Mark a run failed, logging rather than propagating a failure to do so.
async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = devbrief_db::fail_collection_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}
