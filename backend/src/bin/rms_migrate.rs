//! Database migration tool for deploys
//!
//! ```text
//! rms-migrate status
//! rms-migrate deploy [--max-attempts N] [--allow-push]
//! rms-migrate resolve --version V (--applied | --rolled-back)
//! rms-migrate push
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use restaurant_backend::config::{init_tracing, Config, MigrationConfig};
use restaurant_backend::migrate::{DeployOutcome, MigrationRunner, Resolution};

#[derive(Parser, Debug)]
#[command(author, version, about = "Apply and repair database migrations")]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List migrations as applied, pending or failed
    Status,
    /// Apply pending migrations with retry and recovery
    Deploy {
        /// Attempts before giving up
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Push the schema directly when migrations cannot be recovered
        #[arg(long)]
        allow_push: bool,
    },
    /// Mark a migration as applied or rolled back in the history table
    Resolve(ResolveArgs),
    /// Apply the full schema snapshot and baseline every migration
    Push,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    #[arg(long)]
    version: i64,
    #[arg(long, conflicts_with = "rolled_back", required_unless_present = "rolled_back")]
    applied: bool,
    #[arg(long)]
    rolled_back: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("rms_migrate=info,restaurant_backend=info,sqlx=warn");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let url = match cli.database_url {
        Some(url) => url,
        None => Config::load_section::<String>("database.url")?,
    };
    let mut policy: MigrationConfig = Config::load_section("migration")?;

    // Lazy so that an unreachable database surfaces inside the retry loop
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(&url)?;

    match cli.command {
        Command::Status => {
            let runner = MigrationRunner::new(pool, policy);
            for migration in runner.status().await? {
                println!(
                    "{:<16} {:<8} {}",
                    migration.version, migration.state, migration.description
                );
            }
        }
        Command::Deploy {
            max_attempts,
            allow_push,
        } => {
            if let Some(max_attempts) = max_attempts {
                policy.max_attempts = max_attempts;
            }
            let allow_push = allow_push || policy.allow_schema_push;
            let runner = MigrationRunner::new(pool, policy);

            match runner.deploy(allow_push).await? {
                DeployOutcome::Migrated { attempts } => {
                    tracing::info!(attempts, "deploy finished")
                }
                DeployOutcome::SchemaPushed { reason } => {
                    tracing::warn!(%reason, "deploy finished with a schema push")
                }
            }
        }
        Command::Resolve(args) => {
            let resolution = if args.rolled_back {
                Resolution::RolledBack
            } else {
                Resolution::Applied
            };
            MigrationRunner::new(pool, policy)
                .resolve(args.version, resolution)
                .await?;
        }
        Command::Push => {
            MigrationRunner::new(pool, policy).push().await?;
        }
    }

    Ok(())
}
