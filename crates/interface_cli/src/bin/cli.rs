//! Portfolio CLI Binary
//!
//! # Usage
//!
//! ```bash
//! # Upload a spreadsheet export (JSON array of row objects)
//! portfolio-cli ingest --tenant 0190c5d2-... rows.json
//!
//! # Record a claim, then read the metrics
//! portfolio-cli claim --tenant 0190c5d2-... --policy P-100 --paid 40000 --reserve 20000
//! portfolio-cli snapshot --tenant 0190c5d2-...
//! portfolio-cli context --tenant 0190c5d2-...
//! ```
//!
//! # Environment Variables
//!
//! * `DATABASE_URL` - PostgreSQL connection string (fallback)
//! * `PORTFOLIO_DATABASE__URL` - PostgreSQL connection string
//! * `PORTFOLIO_ANALYTICS__EXPENSE_LOAD` - Expense load for the combined ratio (default: 0.15)
//! * `PORTFOLIO_ANALYTICS__CONTEXT_BUDGET` - Context length in characters (default: 4000)
//! * `PORTFOLIO_LOG__LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `PORTFOLIO_LOG__JSON` - Emit JSON logs (default: false)

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use core_kernel::TenantId;
use domain_portfolio::{ClaimRecord, ClaimStatus};
use infra_db::{create_pool, run_migrations, PostgresPortfolioStore};
use interface_cli::{init_tracing, read_upload, AppConfig, PortfolioApp};

/// Insurance portfolio ingestion and analytics
#[derive(Parser, Debug)]
#[command(name = "portfolio-cli", version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short = 'c', global = true, env = "PORTFOLIO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and commit one upload
    Ingest {
        #[arg(long, short = 't')]
        tenant: Uuid,
        /// JSON array of row objects
        file: PathBuf,
    },
    /// Record a claim against a policy number
    Claim {
        #[arg(long, short = 't')]
        tenant: Uuid,
        #[arg(long = "policy")]
        policy_number: String,
        #[arg(long, default_value = "0")]
        paid: Decimal,
        #[arg(long, default_value = "0")]
        reserve: Decimal,
        /// open, closed or reopened
        #[arg(long, default_value = "open")]
        status: ClaimStatus,
    },
    /// Print the aggregate snapshot as JSON
    Snapshot {
        #[arg(long, short = 't')]
        tenant: Uuid,
    },
    /// Print the bounded text context
    Context {
        #[arg(long, short = 't')]
        tenant: Uuid,
    },
    /// List stored policies of any status
    Policies {
        #[arg(long, short = 't')]
        tenant: Uuid,
    },
    /// Check database connectivity
    Health,
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log);

    let db_config = config.database.to_database_config();
    let pool = create_pool(&db_config).await?;
    if config.database.run_migrations || matches!(cli.command, Command::Migrate) {
        run_migrations(&pool).await?;
    }

    let store = Arc::new(PostgresPortfolioStore::new(pool, db_config.statement_timeout_ms()));
    let app = PortfolioApp::new(&config, store)?;

    match cli.command {
        Command::Ingest { tenant, file } => {
            let rows = read_upload(&file)?;
            let report = app.ingest(TenantId::from_uuid(tenant), &rows).await?;
            print_json(&report)?;
        }
        Command::Claim {
            tenant,
            policy_number,
            paid,
            reserve,
            status,
        } => {
            let claim = ClaimRecord::new(TenantId::from_uuid(tenant), policy_number, paid, reserve).with_status(status);
            let claim_id = claim.id;
            app.record_claim(claim).await?;
            println!("{}", claim_id);
        }
        Command::Snapshot { tenant } => {
            print_json(&app.snapshot(TenantId::from_uuid(tenant)).await?)?;
        }
        Command::Context { tenant } => {
            println!("{}", app.context(TenantId::from_uuid(tenant)).await?);
        }
        Command::Policies { tenant } => {
            print_json(&app.policies(TenantId::from_uuid(tenant)).await?)?;
        }
        Command::Health => {
            let result = app.health().await;
            print_json(&result)?;
            if !result.is_operational() {
                anyhow::bail!("store is not operational");
            }
        }
        Command::Migrate => {
            tracing::info!("Migrations applied");
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
