//! Exposes every tenant's `entities` table on the host database through `postgres_fdw`.

use tracing::Instrument;

use crate::db::tenant::{foreign_server_name, foreign_table_name, ENTITY_TABLE};
use crate::db::{quote_ident, quote_literal, HostDatabase, ServerEndpoint};
use crate::error::{BootstrapError, Result};

/// Role and password bound to each foreign server by its user mapping.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

pub fn enable_extension_sql() -> String {
    "CREATE EXTENSION IF NOT EXISTS postgres_fdw".to_string()
}

pub fn foreign_server_sql(tenant: &str, endpoint: &ServerEndpoint) -> String {
    let mut options = vec![format!("dbname {}", quote_literal(tenant))];
    if let Some(host) = &endpoint.host {
        options.push(format!("host {}", quote_literal(host)));
    }
    options.push(format!("port {}", quote_literal(&endpoint.port)));

    format!(
        "CREATE SERVER IF NOT EXISTS {} FOREIGN DATA WRAPPER postgres_fdw OPTIONS ({})",
        quote_ident(&foreign_server_name(tenant)),
        options.join(", ")
    )
}

pub fn user_mapping_sql(tenant: &str, credentials: &Credentials) -> String {
    format!(
        "CREATE USER MAPPING IF NOT EXISTS FOR {} SERVER {} OPTIONS (user {}, password {})",
        quote_ident(&credentials.user),
        quote_ident(&foreign_server_name(tenant)),
        quote_literal(&credentials.user),
        quote_literal(&credentials.password)
    )
}

pub fn foreign_table_sql(tenant: &str) -> String {
    format!(
        "CREATE FOREIGN TABLE IF NOT EXISTS {} (id integer, last_updated timestamp) \
         SERVER {} OPTIONS (table_name {})",
        quote_ident(&foreign_table_name(tenant)),
        quote_ident(&foreign_server_name(tenant)),
        quote_literal(ENTITY_TABLE)
    )
}

/// Wires the federated view for `tenants` on the host database.
///
/// Every statement is guarded by `IF NOT EXISTS`, so running this against an already wired
/// host changes nothing. The first failure aborts; objects created for earlier tenants stay.
///
/// Foreign servers connect back to the port and socket directory the host server reports for
/// itself; `server_host` replaces the socket directory when set.
pub async fn wire_federation<H: HostDatabase>(
    host: &mut H,
    tenants: &[String],
    credentials: &Credentials,
    server_host: Option<&str>,
) -> Result<usize> {
    host.execute(&enable_extension_sql())
        .await
        .map_err(BootstrapError::EnableExtension)?;

    let mut endpoint = host
        .server_endpoint()
        .await
        .map_err(BootstrapError::ServerSettings)?;
    if let Some(server_host) = server_host {
        endpoint.host = Some(server_host.to_string());
    }
    tracing::debug!(?endpoint, "Resolved foreign server endpoint");

    for tenant in tenants {
        let span = tracing::info_span!("tenant", tenant = %tenant);
        wire_tenant(host, tenant, &endpoint, credentials)
            .instrument(span)
            .await?;
    }

    tracing::info!("Federated view covers {} tenants", tenants.len());
    Ok(tenants.len())
}

/// Server, then mapping, then table: each depends on the one before it.
async fn wire_tenant<H: HostDatabase>(
    host: &mut H,
    tenant: &str,
    endpoint: &ServerEndpoint,
    credentials: &Credentials,
) -> Result<()> {
    host.execute(&foreign_server_sql(tenant, endpoint))
        .await
        .map_err(|source| BootstrapError::ForeignServer {
            tenant: tenant.to_string(),
            source,
        })?;

    host.execute(&user_mapping_sql(tenant, credentials))
        .await
        .map_err(|source| BootstrapError::UserMapping {
            tenant: tenant.to_string(),
            source,
        })?;

    host.execute(&foreign_table_sql(tenant))
        .await
        .map_err(|source| BootstrapError::ForeignTable {
            tenant: tenant.to_string(),
            source,
        })?;

    tracing::debug!("Wired foreign table {}", foreign_table_name(tenant));
    Ok(())
}
