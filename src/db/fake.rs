//! In-memory stand-in for a Postgres server, used by the service tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use super::{HostDatabase, ServerEndpoint, TenantDatabase};
use crate::models::EntityRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Probe,
    CreateDatabase(String),
    Connect(String),
    Migrate(String),
    Copy { tenant: String, rows: u64 },
    Close(String),
    Host(String),
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub databases: BTreeMap<String, Vec<EntityRow>>,
    /// Host-side objects keyed by kind, e.g. `server:tenant_0_foreign_data_wrapper`.
    pub objects: BTreeSet<String>,
    pub events: Vec<Event>,
    /// Scripts containing this marker fail like a syntax error.
    pub broken_migration_marker: Option<String>,
    pub fail_copy_for: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakeServer {
    pub state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn with_databases(names: &[&str]) -> Self {
        let server = Self::default();
        {
            let mut state = server.state.lock().unwrap();
            for name in names {
                state.databases.insert(name.to_string(), Vec::new());
            }
        }
        server
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn objects(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().objects.clone()
    }

    pub fn database_names(&self) -> Vec<String> {
        self.state.lock().unwrap().databases.keys().cloned().collect()
    }

    pub fn row_count(&self, database: &str) -> Option<usize> {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(database)
            .map(Vec::len)
    }

    pub fn host(&self) -> FakeHost {
        FakeHost {
            server: self.clone(),
        }
    }
}

fn error(message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Protocol(message.into())
}

fn unquote(token: &str) -> String {
    token
        .trim_end_matches('(')
        .trim_matches('"')
        .replace("\"\"", "\"")
}

/// Parses the object a `CREATE ...` statement targets and whether it is guarded by
/// `IF NOT EXISTS`.
fn ddl_object(sql: &str) -> Option<(String, bool)> {
    let tokens: Vec<&str> = sql.split_whitespace().collect();
    let guarded = sql.contains("IF NOT EXISTS");
    let skip = if guarded { 3 } else { 0 };

    let (kind, rest) = match tokens.as_slice() {
        ["CREATE", "EXTENSION", rest @ ..] => ("extension", rest),
        ["CREATE", "SERVER", rest @ ..] => ("server", rest),
        ["CREATE", "FOREIGN", "TABLE", rest @ ..] => ("table", rest),
        ["CREATE", "USER", "MAPPING", rest @ ..] => {
            let server = rest.iter().position(|t| *t == "SERVER")?;
            let role = rest.iter().position(|t| *t == "FOR")?;
            let key = format!(
                "mapping:{}@{}",
                unquote(rest.get(role + 1)?),
                unquote(rest.get(server + 1)?)
            );
            return Some((key, guarded));
        }
        _ => return None,
    };
    let name = rest.get(skip)?;
    Some((format!("{kind}:{}", unquote(name)), guarded))
}

pub struct FakeHost {
    server: FakeServer,
}

impl HostDatabase for FakeHost {
    type Tenant = FakeTenant;

    async fn find_database_with_prefix(&mut self, prefix: &str) -> Result<Option<String>, sqlx::Error> {
        let mut state = self.server.state.lock().unwrap();
        state.events.push(Event::Probe);
        Ok(state
            .databases
            .keys()
            .find(|name| name.starts_with(prefix))
            .cloned())
    }

    async fn database_exists(&mut self, name: &str) -> Result<bool, sqlx::Error> {
        Ok(self.server.state.lock().unwrap().databases.contains_key(name))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        let mut state = self.server.state.lock().unwrap();

        if let Some(rest) = sql.strip_prefix("CREATE DATABASE ") {
            let name = unquote(rest.trim());
            if state.databases.contains_key(&name) {
                return Err(error(format!("database \"{name}\" already exists")));
            }
            state.databases.insert(name.clone(), Vec::new());
            state.events.push(Event::CreateDatabase(name));
            return Ok(());
        }

        state.events.push(Event::Host(sql.to_string()));
        if let Some((key, guarded)) = ddl_object(sql) {
            if !state.objects.insert(key.clone()) && !guarded {
                return Err(error(format!("{key} already exists")));
            }
            return Ok(());
        }
        Err(error(format!("unsupported statement: {sql}")))
    }

    async fn server_endpoint(&mut self) -> Result<ServerEndpoint, sqlx::Error> {
        Ok(ServerEndpoint {
            host: Some("/var/run/postgresql".into()),
            port: "55432".into(),
        })
    }

    async fn connect_tenant(&self, tenant: &str) -> Result<FakeTenant, sqlx::Error> {
        let mut state = self.server.state.lock().unwrap();
        if !state.databases.contains_key(tenant) {
            return Err(error(format!("database \"{tenant}\" does not exist")));
        }
        state.events.push(Event::Connect(tenant.to_string()));
        Ok(FakeTenant {
            server: self.server.clone(),
            database: tenant.to_string(),
            migrated: false,
        })
    }
}

pub struct FakeTenant {
    server: FakeServer,
    database: String,
    migrated: bool,
}

impl TenantDatabase for FakeTenant {
    async fn execute_script(&mut self, script: &str) -> Result<(), sqlx::Error> {
        let mut state = self.server.state.lock().unwrap();
        if let Some(marker) = &state.broken_migration_marker {
            if script.contains(marker.as_str()) {
                return Err(error("syntax error in migration script"));
            }
        }
        state.events.push(Event::Migrate(self.database.clone()));
        self.migrated = true;
        Ok(())
    }

    async fn copy_entities<I>(&mut self, rows: I) -> Result<u64, sqlx::Error>
    where
        I: Iterator<Item = EntityRow>,
    {
        if !self.migrated {
            return Err(error("relation \"entities\" does not exist"));
        }
        let mut state = self.server.state.lock().unwrap();
        if state.fail_copy_for.as_deref() == Some(self.database.as_str()) {
            return Err(error("COPY failed"));
        }
        let rows: Vec<EntityRow> = rows.collect();
        let count = rows.len() as u64;
        state
            .databases
            .entry(self.database.clone())
            .or_default()
            .extend(rows);
        state.events.push(Event::Copy {
            tenant: self.database.clone(),
            rows: count,
        });
        Ok(count)
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.server
            .state
            .lock()
            .unwrap()
            .events
            .push(Event::Close(self.database));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_object_parsing() {
        assert_eq!(
            ddl_object("CREATE EXTENSION IF NOT EXISTS postgres_fdw"),
            Some(("extension:postgres_fdw".into(), true))
        );
        assert_eq!(
            ddl_object("CREATE SERVER \"s1\" FOREIGN DATA WRAPPER postgres_fdw"),
            Some(("server:s1".into(), false))
        );
        assert_eq!(
            ddl_object("CREATE FOREIGN TABLE IF NOT EXISTS \"t_entities\" (id integer)"),
            Some(("table:t_entities".into(), true))
        );
        assert_eq!(
            ddl_object("CREATE USER MAPPING IF NOT EXISTS FOR \"user\" SERVER \"s1\" OPTIONS (user 'user')"),
            Some(("mapping:user@s1".into(), true))
        );
    }
}
