//! SQLite Decision Store
//!
//! Persists approval decisions using rusqlite with r2d2 connection pooling.
//! Global decisions are stored with an empty `session_key`.

use std::path::Path;

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::services::approval::models::AutoApprovedTool;
use crate::services::approval::store::{session_key, DecisionStore};
use crate::utils::error::{HostError, HostResult};
use crate::utils::paths::decisions_db_path;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Decision store backed by a SQLite database
#[derive(Clone)]
pub struct SqliteDecisionStore {
    pool: DbPool,
}

impl std::fmt::Debug for SqliteDecisionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDecisionStore")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

impl SqliteDecisionStore {
    /// Create a store from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> HostResult<Self> {
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// Limited to a single connection: every in-memory connection is its own database.
    pub fn new_in_memory() -> HostResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| HostError::database(format!("Failed to create connection pool: {}", e)))?;
        Self::from_pool(pool)
    }

    /// Open (or create) the store at the default location (~/.extension-host/decisions.db)
    pub fn new() -> HostResult<Self> {
        Self::open(&decisions_db_path()?)
    }

    /// Open (or create) the store at `db_path`
    pub fn open(db_path: &Path) -> HostResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| HostError::database(format!("Failed to create connection pool: {}", e)))?;

        tracing::debug!(path = %db_path.display(), "opened decision database");
        Self::from_pool(pool)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> HostResult<()> {
        let conn = self.get_connection()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS auto_approved_tools (
                id TEXT PRIMARY KEY,
                tool_name TEXT NOT NULL,
                session_key TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_auto_approved_tool_session
             ON auto_approved_tools(tool_name, session_key)",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> HostResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| HostError::database(format!("Failed to get connection: {}", e)))
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    async fn with_connection<T, F>(&self, f: F) -> HostResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> HostResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| HostError::database(format!("Failed to get connection: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| HostError::internal(format!("Database task failed: {}", e)))?
    }

    // ========================================================================
    // Row operations
    // ========================================================================

    fn is_approved(conn: &Connection, tool_name: &str, key: &str) -> HostResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM auto_approved_tools
             WHERE tool_name = ?1 AND (session_key = '' OR session_key = ?2)",
            params![tool_name, key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert(conn: &Connection, tool_name: &str, key: &str) -> HostResult<String> {
        conn.execute(
            "INSERT INTO auto_approved_tools (id, tool_name, session_key, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(tool_name, session_key) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                tool_name,
                key,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM auto_approved_tools WHERE tool_name = ?1 AND session_key = ?2",
            params![tool_name, key],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list(conn: &Connection, key: &str) -> HostResult<Vec<AutoApprovedTool>> {
        let mut stmt = conn.prepare(
            "SELECT id, tool_name, session_key, created_at FROM auto_approved_tools
             WHERE session_key = ?1 ORDER BY tool_name",
        )?;
        let rows = stmt
            .query_map(params![key], |row| {
                let session: String = row.get(2)?;
                Ok(AutoApprovedTool {
                    id: row.get(0)?,
                    tool_name: row.get(1)?,
                    session_id: if session.is_empty() { None } else { Some(session) },
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn delete(conn: &Connection, tool_name: &str, key: &str) -> HostResult<()> {
        conn.execute(
            "DELETE FROM auto_approved_tools WHERE tool_name = ?1 AND session_key = ?2",
            params![tool_name, key],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DecisionStore for SqliteDecisionStore {
    async fn is_tool_auto_approved(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
    ) -> HostResult<bool> {
        let tool_name = tool_name.to_string();
        let key = session_key(session_id);
        self.with_connection(move |conn| Self::is_approved(conn, &tool_name, &key))
            .await
    }

    async fn add_auto_approved_tool(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
    ) -> HostResult<String> {
        let tool_name = tool_name.to_string();
        let key = session_key(session_id);
        self.with_connection(move |conn| Self::insert(conn, &tool_name, &key))
            .await
    }

    async fn get_auto_approved_tools(
        &self,
        session_id: Option<&str>,
    ) -> HostResult<Vec<AutoApprovedTool>> {
        let key = session_key(session_id);
        self.with_connection(move |conn| Self::list(conn, &key)).await
    }

    async fn remove_auto_approved_tool(
        &self,
        tool_name: &str,
        session_id: Option<&str>,
    ) -> HostResult<()> {
        let tool_name = tool_name.to_string();
        let key = session_key(session_id);
        self.with_connection(move |conn| Self::delete(conn, &tool_name, &key))
            .await
    }
}
