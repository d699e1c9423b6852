/// Prefix shared by every tenant database.
pub const TENANT_PREFIX: &str = "tenant_";

/// Table inside each tenant database that holds the mock entities.
pub const ENTITY_TABLE: &str = "entities";

/// Columns of [`ENTITY_TABLE`] in bulk-load order.
pub const ENTITY_COLUMNS: [&str; 2] = ["id", "last_updated"];

/// Ordered tenant identifiers `tenant_0 ..= tenant_{tenant_count}`.
///
/// The range is inclusive, so a count of `C` yields `C + 1` tenants. Provisioning and
/// federation both derive their tenant set from here and must stay in step.
pub fn list_of_tenants(tenant_count: u32) -> Vec<String> {
    (0..=tenant_count).map(tenant_name).collect()
}

pub fn tenant_name(index: u32) -> String {
    format!("{TENANT_PREFIX}{index}")
}

/// Name of the `postgres_fdw` server pointing at a tenant database.
pub fn foreign_server_name(tenant: &str) -> String {
    format!("{tenant}_foreign_data_wrapper")
}

/// Name of the host-side foreign table exposing a tenant's entities.
pub fn foreign_table_name(tenant: &str) -> String {
    format!("{tenant}_{ENTITY_TABLE}")
}
