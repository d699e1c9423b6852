use std::path::PathBuf;

use thiserror::Error;

/// Every way the bootstrap can fail. None of them are retried.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("can't connect to database {database}: {source}")]
    Connect {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to probe for existing tenant databases: {0}")]
    Probe(#[source] sqlx::Error),

    #[error("failed to create tenant database {tenant}: {source}")]
    CreateDatabase {
        tenant: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("can't create schema for tenant {tenant}: {source}")]
    Migrate {
        tenant: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("can't load mock data into tenant {tenant}: {source}")]
    BulkLoad {
        tenant: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("can't enable postgres_fdw on the host database: {0}")]
    EnableExtension(#[source] sqlx::Error),

    #[error("can't read port and socket settings of the host server: {0}")]
    ServerSettings(#[source] sqlx::Error),

    #[error("can't create foreign server for tenant {tenant}: {source}")]
    ForeignServer {
        tenant: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("can't create user mapping for tenant {tenant}: {source}")]
    UserMapping {
        tenant: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("can't create foreign table for tenant {tenant}: {source}")]
    ForeignTable {
        tenant: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("can't read migration script {path:?}: {source}")]
    MigrationFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BootstrapError {
    /// The tenant the failure belongs to, if it happened inside a per-tenant step.
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Self::CreateDatabase { tenant, .. }
            | Self::Migrate { tenant, .. }
            | Self::BulkLoad { tenant, .. }
            | Self::ForeignServer { tenant, .. }
            | Self::UserMapping { tenant, .. }
            | Self::ForeignTable { tenant, .. } => Some(tenant),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
