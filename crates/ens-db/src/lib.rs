pub mod contacts;
pub mod error;
pub mod kinds;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod queries;
pub mod store;

pub use error::{Result, StoreError};
pub use kinds::{Groups, Kind, Recipients, Templates};
pub use models::Record;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::init(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private throwaway store, used by tests and local experiments.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Ownership cascades and membership cleanup rely on this.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an IMMEDIATE transaction. Commits on `Ok`, rolls back
    /// when the transaction is dropped on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopening_a_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ens.db");

        {
            let db = Database::open(&path).unwrap();
            db.create_user(uuid::Uuid::now_v7(), "alice", "hash").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.get_user_by_name("alice").unwrap().is_some());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let user_id = uuid::Uuid::now_v7();

        let result: Result<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (user_id, name, password_hash) VALUES (?1, 'bob', 'x')",
                [user_id.to_string()],
            )?;
            Err(StoreError::NotFound("anything"))
        });

        assert!(result.is_err());
        assert!(db.get_user_by_name("bob").unwrap().is_none());
    }
}
