use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenant_federation::db::PgHost;
use tenant_federation::services::bootstrap::{bootstrap, BootstrapPlan};
use tenant_federation::{BootstrapError, Config, ProvisionMode};

/// Provision mock tenant databases and expose them as one federated view.
#[derive(Parser)]
#[command(name = "tenant-federation")]
struct Args {
    /// Highest tenant index (tenant_0 ..= tenant_N are managed)
    #[arg(long)]
    tenant_count: Option<u32>,

    /// Exclusive upper bound on mock rows per tenant
    #[arg(long)]
    max_rows: Option<u32>,

    /// SQL file replacing the embedded tenant migration
    #[arg(long)]
    migration: Option<PathBuf>,

    /// Check each tenant database individually instead of skipping once any exists
    #[arg(long)]
    per_tenant: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tenant_federation=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(count) = args.tenant_count {
        config.tenant_count = count;
    }
    if let Some(max) = args.max_rows {
        config.max_entities_per_tenant = max;
    }
    if args.migration.is_some() {
        config.migration_path = args.migration;
    }
    if args.per_tenant {
        config.provision_mode = ProvisionMode::PerTenant;
    }

    if let Err(e) = run(&config).await {
        match e.tenant() {
            Some(tenant) => error!(tenant, "{}", e),
            None => error!("{}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: &Config) -> Result<(), BootstrapError> {
    let plan = BootstrapPlan::from_config(config)?;

    let mut host = PgHost::connect(config)
        .await
        .map_err(|source| BootstrapError::Connect {
            database: config.host_database.clone(),
            source,
        })?;

    let outcome = bootstrap(&mut host, &plan).await?;

    let rows: u64 = outcome.provisioned.iter().map(|p| p.rows).sum();
    if outcome.provisioning_ran {
        info!(
            "Provisioned {} tenant databases with {} entities",
            outcome.provisioned.len(),
            rows
        );
    }
    info!("Federated view ready across {} tenants", outcome.tenants_wired);

    if let Err(e) = host.close().await {
        tracing::warn!("Failed to close host connection cleanly: {}", e);
    }
    Ok(())
}
