pub mod tenant;

#[cfg(test)]
pub mod fake;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use crate::config::Config;
use crate::models::EntityRow;
use tenant::{ENTITY_COLUMNS, ENTITY_TABLE};

/// Flush the COPY buffer to the server once it grows past this many bytes.
const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// Address a Postgres server uses to reach itself; foreign servers point here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: Option<String>,
    pub port: String,
}

/// Connection to the database hosting the federated view.
#[allow(async_fn_in_trait)]
pub trait HostDatabase {
    type Tenant: TenantDatabase;

    /// Returns the name of some database whose name starts with `prefix`, if any.
    async fn find_database_with_prefix(&mut self, prefix: &str) -> Result<Option<String>, sqlx::Error>;

    async fn database_exists(&mut self, name: &str) -> Result<bool, sqlx::Error>;

    /// Executes a single statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error>;

    /// Port and socket directory the server itself listens on.
    async fn server_endpoint(&mut self) -> Result<ServerEndpoint, sqlx::Error>;

    /// Opens a fresh connection scoped to a tenant database.
    async fn connect_tenant(&self, tenant: &str) -> Result<Self::Tenant, sqlx::Error>;
}

/// Connection scoped to one tenant database.
#[allow(async_fn_in_trait)]
pub trait TenantDatabase {
    /// Runs a script, possibly containing several statements, as one batch.
    async fn execute_script(&mut self, script: &str) -> Result<(), sqlx::Error>;

    /// Streams rows into `entities (id, last_updated)`, returning how many were written.
    async fn copy_entities<I>(&mut self, rows: I) -> Result<u64, sqlx::Error>
    where
        I: Iterator<Item = EntityRow>;

    async fn close(self) -> Result<(), sqlx::Error>;
}

/// Connection options for `database` on the configured server.
pub fn connect_options(config: &Config, database: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(database)
        .ssl_mode(config.ssl_mode)
}

/// Quotes an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes an SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `LIKE` pattern matching names that start with `prefix` literally.
pub fn prefix_pattern(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

/// First non-empty entry of `unix_socket_directories`.
pub fn first_socket_directory(setting: &str) -> Option<String> {
    setting
        .split(',')
        .map(str::trim)
        .find(|dir| !dir.is_empty())
        .map(str::to_string)
}

pub struct PgHost {
    conn: PgConnection,
    options: PgConnectOptions,
}

impl PgHost {
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let options = connect_options(config, &config.host_database);
        let conn = PgConnection::connect_with(&options).await?;
        Ok(Self { conn, options })
    }

    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

impl HostDatabase for PgHost {
    type Tenant = PgTenant;

    async fn find_database_with_prefix(&mut self, prefix: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT datname FROM pg_database WHERE datname LIKE $1 LIMIT 1")
            .bind(prefix_pattern(prefix))
            .fetch_optional(&mut self.conn)
            .await
    }

    async fn database_exists(&mut self, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&mut self.conn)
            .await
    }

    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(sql).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn server_endpoint(&mut self) -> Result<ServerEndpoint, sqlx::Error> {
        let (port, sockets): (String, String) = sqlx::query_as(
            "SELECT current_setting('port'), current_setting('unix_socket_directories')",
        )
        .fetch_one(&mut self.conn)
        .await?;

        Ok(ServerEndpoint {
            host: first_socket_directory(&sockets),
            port,
        })
    }

    async fn connect_tenant(&self, tenant: &str) -> Result<PgTenant, sqlx::Error> {
        let options = self.options.clone().database(tenant);
        let conn = PgConnection::connect_with(&options).await?;
        Ok(PgTenant { conn })
    }
}

/// Tenant connection. Dropping it without [`TenantDatabase::close`] still closes the socket.
pub struct PgTenant {
    conn: PgConnection,
}

impl TenantDatabase for PgTenant {
    async fn execute_script(&mut self, script: &str) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(script).execute(&mut self.conn).await?;
        Ok(())
    }

    async fn copy_entities<I>(&mut self, rows: I) -> Result<u64, sqlx::Error>
    where
        I: Iterator<Item = EntityRow>,
    {
        let statement = format!(
            "COPY {} ({}) FROM STDIN",
            quote_ident(ENTITY_TABLE),
            ENTITY_COLUMNS.map(quote_ident).join(", ")
        );
        let mut copy = self.conn.copy_in_raw(&statement).await?;

        let mut buf = Vec::with_capacity(COPY_CHUNK_BYTES + 64);
        let mut rows = rows.peekable();
        while let Some(row) = rows.next() {
            row.write_copy_text(&mut buf);
            if buf.len() < COPY_CHUNK_BYTES && rows.peek().is_some() {
                continue;
            }
            let sent = copy.send(std::mem::take(&mut buf)).await.map(|_| ());
            if let Err(e) = sent {
                let _ = copy.abort(e.to_string()).await;
                return Err(e);
            }
        }

        copy.finish().await
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}
