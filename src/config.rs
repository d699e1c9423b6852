use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use sqlx::postgres::PgSslMode;

/// How the bootstrap decides whether tenant databases still need provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
    /// Skip provisioning entirely as soon as any `tenant_*` database exists.
    Global,
    /// Check each tenant database individually and only provision the missing ones.
    PerTenant,
}

impl FromStr for ProvisionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "per-tenant" | "per_tenant" => Ok(Self::PerTenant),
            other => Err(anyhow::anyhow!("Unknown provision mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database that hosts the federated view.
    pub host_database: String,
    pub ssl_mode: PgSslMode,
    /// Highest tenant index; `tenant_0..=tenant_{tenant_count}` are managed.
    pub tenant_count: u32,
    /// Exclusive upper bound on mock rows loaded into each tenant.
    pub max_entities_per_tenant: u32,
    pub migration_path: Option<PathBuf>,
    pub provision_mode: ProvisionMode,
    /// Host foreign servers connect to instead of the server's own socket directory.
    pub fdw_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "user".into(),
            password: "password".into(),
            host_database: "postgres".into(),
            ssl_mode: PgSslMode::Prefer,
            tenant_count: 80,
            max_entities_per_tenant: 1200,
            migration_path: None,
            provision_mode: ProvisionMode::Global,
            fdw_host: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".into()),
            port: env::var("DB_PORT")
                .unwrap_or_else(|_| "5432".into())
                .parse()?,
            user: env::var("DB_USER").unwrap_or_else(|_| "user".into()),
            password: env::var("DB_PASSWORD").unwrap_or_else(|_| "password".into()),
            host_database: env::var("DB_NAME").unwrap_or_else(|_| "postgres".into()),
            ssl_mode: env::var("DB_SSL_MODE")
                .unwrap_or_else(|_| "prefer".into())
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid DB_SSL_MODE: {}", e))?,
            tenant_count: env::var("TENANT_COUNT")
                .unwrap_or_else(|_| "80".into())
                .parse()?,
            max_entities_per_tenant: env::var("PER_TENANT_ENTITY_COUNT")
                .unwrap_or_else(|_| "1200".into())
                .parse()?,
            migration_path: env::var("TENANT_MIGRATION_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            provision_mode: env::var("PROVISION_MODE")
                .unwrap_or_else(|_| "global".into())
                .parse()?,
            fdw_host: env::var("FDW_SERVER_HOST").ok().filter(|s| !s.is_empty()),
        })
    }
}
