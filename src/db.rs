use crate::config;
use crate::error::CatalogError;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::Connection as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::LazyLock;

pub type Connection = PooledConnection<ConnectionManager<PgConnection>>;
pub type ConnectionPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Returns a connection to the database from the process-wide connection pool.
pub fn get_connection() -> Result<Connection, CatalogError> {
    CONNECTION_POOL.get().map_err(CatalogError::Pool)
}

/// Runs embedded migrations, bringing a fresh or stale database up to the current schema.
pub fn run_migrations(conn: &mut PgConnection) -> Result<(), CatalogError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|err| CatalogError::Migration(err.to_string()))
}

/// Builds a `postgres://` URL from discrete `POSTGRES_*` environment variables, falling back to
/// `localhost` when not running inside the Docker deployment.
pub fn create_url() -> String {
    if std::env::var("DOCKER_DEPLOYMENT").is_err() {
        let _ = dotenvy::dotenv();
    }

    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "archivist".to_string());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_else(|_| "archivist".to_string());
    let database = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "archivist".to_string());
    let hostname = match std::env::var("DOCKER_DEPLOYMENT") {
        Ok(_) => "host.docker.internal",
        Err(_) => "localhost",
    };

    format!("postgres://{user}:{password}@{hostname}/{database}")
}

static CONNECTION_POOL: LazyLock<ConnectionPool> = LazyLock::new(|| {
    let num_threads = tokio::runtime::Handle::try_current()
        .map(|handle| handle.metrics().num_workers())
        .unwrap_or(1);
    let manager = ConnectionManager::new(config::get().database_url());
    Pool::builder()
        .max_size(num_threads as u32)
        .max_lifetime(None)
        .idle_timeout(None)
        .test_on_check_out(true)
        .build(manager)
        .expect("could not build connection pool")
});

/// Runs `body` inside a single database transaction, committing on `Ok` and rolling back on `Err`.
pub fn transaction<T, F>(conn: &mut PgConnection, body: F) -> Result<T, CatalogError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, CatalogError>,
{
    conn.transaction(body)
}
