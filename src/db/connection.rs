//! SQLite connection pool
//!
//! All persistence goes through one pooled SQLite file. Tool calls arrive
//! one at a time over stdio, so the pool stays small; WAL keeps the
//! best-effort popularity writes from blocking behind a materialization
//! transaction.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;

/// Database error types
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Shared handle to the connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and build the pool.
    ///
    /// Every pooled connection enforces foreign keys; referential integrity
    /// between templates, items, and logged meals is part of the schema, not
    /// the application code.
    pub fn new<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .build(manager)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Execute a closure with a database connection
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DbResult<T>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }

    /// Execute a closure with a mutable database connection (for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> DbResult<T>,
    {
        let mut conn = self.get_conn()?;
        f(&mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Shared-cache memory URI so every pooled connection sees one database
    fn memory_db(name: &str) -> Database {
        Database::new(format!("file:{}?mode=memory&cache=shared", name)).expect("open pool")
    }

    #[test]
    fn test_pooled_connections_share_schema() {
        let db = memory_db("share_schema");

        db.with_conn(|conn| {
            crate::db::migrations::run_migrations(conn)?;
            Ok(())
        })
        .unwrap();

        // A different pooled connection sees the migrated schema
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))
                    .map_err(DbError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = memory_db("fk_enforced");

        db.with_conn(|conn| {
            crate::db::migrations::run_migrations(conn)?;
            Ok(())
        })
        .unwrap();

        let err = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO food_servings (food_id, unit, gram_weight) VALUES (999, 'cup', 240.0)",
                [],
            )
            .map_err(DbError::from)?;
            Ok(())
        });
        assert!(err.is_err());
    }
}
