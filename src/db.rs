//! SQLite database handle using rusqlite.

use crate::error::AppResult;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const IN_MEMORY: &str = ":memory:";

/// A shareable SQLite handle.
///
/// The connection sits behind a mutex and every closure runs on a
/// `spawn_blocking` thread, so callers on the async runtime never block on
/// disk I/O. A closure holds the connection for its whole body, which makes
/// each call a unit of isolation.
#[derive(Clone)]
pub struct Db {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open a local SQLite database (or `:memory:`) with WAL mode enabled.
    pub fn open(path: &str) -> AppResult<Self> {
        let conn = if path == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open with retries and exponential backoff. Another server process may
    /// briefly hold the file lock during its own startup.
    pub async fn open_with_retry(
        path: &str,
        max_retries: u32,
        base_delay: Duration,
    ) -> AppResult<Self> {
        let mut attempt = 0;
        loop {
            match Self::open(path) {
                Ok(db) => return Ok(db),
                Err(e) if attempt < max_retries => {
                    let delay = base_delay * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Failed to open vehicle database, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute a read-only closure against the connection.
    pub async fn call<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock())).await?
    }

    /// Execute a mutating closure; use this when the closure opens a transaction.
    pub async fn call_mut<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&mut conn.lock())).await?
    }
}
