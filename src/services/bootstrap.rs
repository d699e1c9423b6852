//! Top-level sequencing: provision tenants (at most once), then wire the federated view.

use std::borrow::Cow;

use crate::config::{Config, ProvisionMode};
use crate::db::tenant::{list_of_tenants, TENANT_PREFIX};
use crate::db::HostDatabase;
use crate::error::{BootstrapError, Result};
use crate::services::federation::{wire_federation, Credentials};
use crate::services::provisioner::{ProvisionedTenant, Provisioner, TENANT_MIGRATION};

/// What a bootstrap run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    /// `false` when nothing was provisioned: the gate skipped it or every tenant existed.
    pub provisioning_ran: bool,
    pub provisioned: Vec<ProvisionedTenant>,
    pub tenants_wired: usize,
}

/// Everything the sequencer needs besides the host connection.
#[derive(Debug, Clone)]
pub struct BootstrapPlan<'a> {
    pub tenant_count: u32,
    pub max_entities_per_tenant: u32,
    pub migration: Cow<'a, str>,
    pub provision_mode: ProvisionMode,
    pub credentials: Credentials,
    pub fdw_host: Option<String>,
}

impl BootstrapPlan<'static> {
    /// Builds the plan from configuration, reading the migration override if one is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let migration = match &config.migration_path {
            Some(path) => Cow::Owned(std::fs::read_to_string(path).map_err(|source| {
                BootstrapError::MigrationFile {
                    path: path.clone(),
                    source,
                }
            })?),
            None => Cow::Borrowed(TENANT_MIGRATION),
        };

        Ok(Self {
            tenant_count: config.tenant_count,
            max_entities_per_tenant: config.max_entities_per_tenant,
            migration,
            provision_mode: config.provision_mode,
            credentials: Credentials {
                user: config.user.clone(),
                password: config.password.clone(),
            },
            fdw_host: config.fdw_host.clone(),
        })
    }
}

pub async fn bootstrap<H: HostDatabase>(
    host: &mut H,
    plan: &BootstrapPlan<'_>,
) -> Result<BootstrapOutcome> {
    let tenants = list_of_tenants(plan.tenant_count);

    let provisioner = Provisioner::new(&plan.migration, plan.max_entities_per_tenant);
    let (provisioning_ran, provisioned) = match plan.provision_mode {
        ProvisionMode::Global => {
            let existing = host
                .find_database_with_prefix(TENANT_PREFIX)
                .await
                .map_err(BootstrapError::Probe)?;
            match existing {
                Some(name) => {
                    tracing::info!("Found tenant database {}, skipping provisioning", name);
                    (false, Vec::new())
                }
                None => {
                    tracing::info!(
                        "Creating {} tenant databases with mock data, may take a moment...",
                        tenants.len()
                    );
                    (true, provisioner.provision_all(host, &tenants).await?)
                }
            }
        }
        ProvisionMode::PerTenant => {
            tracing::info!("Ensuring {} tenant databases exist", tenants.len());
            let provisioned = provisioner
                .skip_existing(true)
                .provision_all(host, &tenants)
                .await?;
            (!provisioned.is_empty(), provisioned)
        }
    };

    tracing::info!("Creating federated view");
    let tenants_wired = wire_federation(
        host,
        &tenants,
        &plan.credentials,
        plan.fdw_host.as_deref(),
    )
    .await?;

    Ok(BootstrapOutcome {
        provisioning_ran,
        provisioned,
        tenants_wired,
    })
}
