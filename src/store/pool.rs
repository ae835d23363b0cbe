//! Fixed-size SQLite connection pool.
//!
//! Connections are opened once and reused. Checkout is bounded by a
//! semaphore with one permit per connection, so a permit holder always finds
//! an idle connection. Queries run on the blocking thread pool, and the
//! connection goes back to the idle list from there, even when the caller
//! stopped waiting.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::StoreError;

type IdleList = Arc<Mutex<Vec<Connection>>>;

pub struct ConnectionPool {
    idle: IdleList,
    permits: Arc<Semaphore>,
}

impl ConnectionPool {
    /// Open `size` connections to the database at `path`.
    pub fn open(path: &Path, size: usize, busy_timeout: Duration) -> Result<Self, StoreError> {
        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            idle.push(open_connection(path, busy_timeout)?);
        }

        tracing::debug!(path = %path.display(), size, "Connection pool opened");

        Ok(Self {
            idle: Arc::new(Mutex::new(idle)),
            permits: Arc::new(Semaphore::new(size)),
        })
    }

    /// Connections not currently checked out.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `f` with exclusive use of a pooled connection.
    pub async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        let conn = self
            .idle
            .lock()
            .expect("connection pool mutex poisoned")
            .pop()
            .ok_or(StoreError::PoolClosed)?;

        let mut checkout = Checkout {
            conn: Some(conn),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        };

        tokio::task::spawn_blocking(move || match checkout.conn.as_mut() {
            Some(conn) => f(conn),
            None => Err(StoreError::PoolClosed),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Database task failed");
            StoreError::Task(e.to_string())
        })?
    }

    /// Refuse further checkouts. In-progress work finishes normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// A checked-out connection. Dropping it returns the connection to the idle
/// list before the permit is released.
struct Checkout {
    conn: Option<Connection>,
    idle: IdleList,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match self.idle.lock() {
                Ok(mut idle) => idle.push(conn),
                Err(poisoned) => poisoned.into_inner().push(conn),
            }
        }
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    Ok(conn)
}
