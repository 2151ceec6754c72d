//! SQLite adapter: Implementation of ReadingCatalog.
//!
//! Provides the durable reading source the training pipeline consumes in
//! production deployments.
//!
//! # Mutex Behavior
//!
//! Database connection is protected by `Mutex`. A poisoned mutex (from panic
//! in another thread) will cause panic. This fail-fast behavior is intentional
//! for data integrity.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::domain::Reading;
use crate::ports::ReadingCatalog;

/// Error type for catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid stored reading: {0}")]
    InvalidRow(String),
}

/// SQLite reading catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) a catalog at the given database path.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        let catalog = Self {
            conn: Mutex::new(conn),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Create an in-memory catalog (for testing).
    ///
    /// # Errors
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        let catalog = Self {
            conn: Mutex::new(conn),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), CatalogError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY,
                magnitude REAL NOT NULL,
                occurred_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_occurred
                ON readings(occurred_at ASC);
            ",
        )?;

        Ok(())
    }

    /// Insert a batch of readings in one transaction.
    ///
    /// # Errors
    /// Returns error if the insert fails.
    pub fn insert_readings(&self, readings: &[Reading]) -> Result<(), CatalogError> {
        let mut conn = self.conn.lock().expect("Lock failed");
        let tx = conn.transaction()?;

        for reading in readings {
            tx.execute(
                "INSERT INTO readings (magnitude, occurred_at) VALUES (?1, ?2)",
                params![reading.magnitude, reading.occurred_at.to_rfc3339()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Total number of stored readings.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn count_readings(&self) -> Result<usize, CatalogError> {
        let conn = self.conn.lock().expect("Lock failed");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl ReadingCatalog for SqliteCatalog {
    type Error = CatalogError;

    fn load_readings(&self) -> Result<Vec<Reading>, CatalogError> {
        let conn = self.conn.lock().expect("Lock failed");
        let mut stmt =
            conn.prepare("SELECT magnitude, occurred_at FROM readings ORDER BY occurred_at ASC")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut readings = Vec::new();
        for row in rows {
            let (magnitude, occurred_at) = row?;
            let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
                .map_err(|e| CatalogError::InvalidRow(format!("bad timestamp: {e}")))?
                .with_timezone(&Utc);
            readings.push(Reading::new(magnitude, occurred_at));
        }

        Ok(readings)
    }
}
