//! Shared test-database harness. A single Postgres database is dropped, recreated, and migrated
//! once per test binary run, then handed out to every `#[cfg(test)]` module that needs a real
//! Catalog to assert against.
#![cfg(test)]

use crate::db::{self, Connection, ConnectionPool};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{PgConnection, RunQueryDsl};
use std::sync::{Mutex, MutexGuard, OnceLock};

const DATABASE_NAME: &str = "archivist_test";

static TEST_POOL: OnceLock<Mutex<Option<ConnectionPool>>> = OnceLock::new();

/// Returns a connection to the shared test database, creating and migrating it on first use.
pub(crate) fn get_connection() -> Connection {
    let mut guard = pool_guard();
    let pool = guard.get_or_insert_with(|| recreate_database().expect("test database must be constructible"));
    pool.get().expect("test connection pool must yield a connection")
}

fn pool_guard() -> MutexGuard<'static, Option<ConnectionPool>> {
    match TEST_POOL.get_or_init(|| Mutex::new(None)).lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            eprintln!("test database pool poisoned, resetting");
            let mut guard = poisoned.into_inner();
            *guard = None;
            guard
        }
    }
}

fn recreate_database() -> Result<ConnectionPool, diesel::r2d2::PoolError> {
    let admin_pool = Pool::builder()
        .max_size(1)
        .build(ConnectionManager::<PgConnection>::new(database_url("postgres")))
        .expect("postgres connection pool must be constructible");
    let mut conn = admin_pool.get()?;
    diesel::sql_query(format!("DROP DATABASE IF EXISTS {DATABASE_NAME}")).execute(&mut conn).expect("drop test database");
    diesel::sql_query(format!("CREATE DATABASE {DATABASE_NAME}")).execute(&mut conn).expect("create test database");

    let test_pool = Pool::builder()
        .max_lifetime(None)
        .idle_timeout(None)
        .test_on_check_out(true)
        .build(ConnectionManager::new(database_url(DATABASE_NAME)))
        .expect("test connection pool must be constructible");
    let mut conn = test_pool.get().expect("test database must yield a connection");
    db::run_migrations(&mut conn).expect("test migrations must apply");
    Ok(test_pool)
}

/// Swaps the trailing database-name path segment of `create_url()`'s connection string.
fn database_url(database: &str) -> String {
    let url = db::create_url();
    let (prefix, _) = url.rsplit_once('/').expect("database url must contain a path segment");
    format!("{prefix}/{database}")
}
