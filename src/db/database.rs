//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql for the nested-set `nodes` table.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any valid PathBuf
//! - **Single table**: one `nodes` table shared by all scopes
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Indexed boundaries**: `(scope, lft)` and `(scope, rgt)` indexes back
//!   the allocator's bulk shifts and the traversal queries
//!
//! # Database Connection Patterns
//!
//! Always use `connect_with_timeout()` in async functions so concurrent
//! operations wait on the busy timeout instead of failing immediately with
//! `SQLITE_BUSY` when Tokio moves futures between threads.

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every connection, in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use arbor_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = DatabaseService::new(PathBuf::from("./data/arbor.db")).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the parent directory cannot be created,
    /// the connection fails, or schema initialization fails.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // WAL checkpoint is only needed the first time the file is created
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Open a connection with the busy timeout applied.
    ///
    /// This is the connection entry point for all async code paths.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.db.connect()?;
        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
            .await?;
        Ok(conn)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates the `nodes` table and its indexes using CREATE TABLE IF NOT
    /// EXISTS, so initialization is idempotent.
    ///
    /// # Schema
    ///
    /// One row per tree node. Structural columns use the historical short
    /// names `lft`/`rgt`/`lvl`; `scope` partitions independent trees.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                lft INTEGER NOT NULL,
                rgt INTEGER NOT NULL,
                lvl INTEGER NOT NULL,
                parent_id TEXT,
                content TEXT NOT NULL DEFAULT '',
                path_part TEXT,
                path TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                properties JSON NOT NULL DEFAULT '{}'
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create nodes table: {}", e))
        })?;

        // Boundary indexes: every gap shift and traversal predicate hits one
        // of these two.
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_scope_lft ON nodes(scope, lft)",
            (),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to create lft index: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_scope_rgt ON nodes(scope, rgt)",
            (),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to create rgt index: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create parent index: {}", e))
        })?;

        // Flush schema for newly created files so rapid open/reopen in tests
        // never observes a missing table through the WAL.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }
}
