//! Creates, migrates and seeds tenant databases.

use tracing::Instrument;

use crate::db::{quote_ident, HostDatabase, TenantDatabase};
use crate::error::{BootstrapError, Result};
use crate::services::mock_data::MockEntities;

/// Default tenant schema, applied verbatim to every new tenant database.
pub const TENANT_MIGRATION: &str = include_str!("../../migrations/tenant.sql");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedTenant {
    pub tenant: String,
    pub rows: u64,
}

pub struct Provisioner<'a> {
    migration: &'a str,
    max_entities_per_tenant: u32,
    skip_existing: bool,
}

impl<'a> Provisioner<'a> {
    pub fn new(migration: &'a str, max_entities_per_tenant: u32) -> Self {
        Self {
            migration,
            max_entities_per_tenant,
            skip_existing: false,
        }
    }

    /// Check each tenant database before creating it and leave existing ones alone.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Provisions `tenants` one at a time, stopping at the first failure.
    pub async fn provision_all<H: HostDatabase>(
        &self,
        host: &mut H,
        tenants: &[String],
    ) -> Result<Vec<ProvisionedTenant>> {
        let mut provisioned = Vec::with_capacity(tenants.len());

        for tenant in tenants {
            let span = tracing::info_span!("tenant", tenant = %tenant);
            if let Some(done) = self.provision_tenant(host, tenant).instrument(span).await? {
                provisioned.push(done);
            }
        }

        Ok(provisioned)
    }

    /// Returns `None` when the tenant already existed and was skipped.
    async fn provision_tenant<H: HostDatabase>(
        &self,
        host: &mut H,
        tenant: &str,
    ) -> Result<Option<ProvisionedTenant>> {
        if self.skip_existing {
            let exists = host
                .database_exists(tenant)
                .await
                .map_err(BootstrapError::Probe)?;
            if exists {
                tracing::info!("Tenant database already exists, skipping");
                return Ok(None);
            }
        }

        host.execute(&format!("CREATE DATABASE {}", quote_ident(tenant)))
            .await
            .map_err(|source| BootstrapError::CreateDatabase {
                tenant: tenant.to_string(),
                source,
            })?;

        // Dropped on every early return below, which closes the socket.
        let mut conn = host
            .connect_tenant(tenant)
            .await
            .map_err(|source| BootstrapError::Connect {
                database: tenant.to_string(),
                source,
            })?;

        conn.execute_script(self.migration)
            .await
            .map_err(|source| BootstrapError::Migrate {
                tenant: tenant.to_string(),
                source,
            })?;

        let rows = conn
            .copy_entities(MockEntities::new(self.max_entities_per_tenant))
            .await
            .map_err(|source| BootstrapError::BulkLoad {
                tenant: tenant.to_string(),
                source,
            })?;

        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close tenant connection cleanly: {}", e);
        }

        tracing::info!("Provisioned tenant database with {} entities", rows);
        Ok(Some(ProvisionedTenant {
            tenant: tenant.to_string(),
            rows,
        }))
    }
}
