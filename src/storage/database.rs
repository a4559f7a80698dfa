// Library Core - Authors, Books and Borrows
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Database connection and management
//!
//! This module handles database connection pooling, initialization, and maintenance.
//!
//! # Opening vs Creating
//! - [`Database::create`] makes the file when it is missing and runs the setup
//!   script (schema, plus sample data when configured).
//! - [`Database::open`] only accepts an existing file whose schema is already
//!   in place. A missing file is `FileNotFound`; missing tables are
//!   `SchemaMismatch`. Nothing is repaired automatically.
//!
//! # SQLite Configuration
//! - WAL mode for file databases
//! - Foreign keys enabled on every pooled connection (configurable)
//! - Normal synchronous mode (balance safety/speed)

use crate::config::LibraryConfig;
use crate::error::{LibraryError, Result};
use crate::storage::migrations::{self, REQUIRED_TABLES};
use crate::storage::models::TableCounts;
use crate::storage::queries;
use sqlx::{
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
    ConnectOptions,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Database manager - handles connection pooling and operations
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>, // None for in-memory databases
}

impl Database {
    /// Create (or reuse) a database file and run the setup script
    ///
    /// # Errors
    /// Returns error if:
    /// - Parent directory doesn't exist and can't be created
    /// - Database file can't be opened
    /// - Migrations fail
    pub async fn create<P: AsRef<Path>>(database_path: P, config: &LibraryConfig) -> Result<Self> {
        let path = database_path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LibraryError::IoError(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create database directory {}: {}", parent.display(), e),
                    ))
                })?;
            }
        }

        let pool = Self::connect_file(path, config, true).await?;
        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };

        let applied = migrations::run_migrations(&db.pool, config.seed_sample_data).await?;
        info!(path = %path.display(), applied = applied.len(), "database ready");

        Ok(db)
    }

    /// Open an existing, already initialised database file
    ///
    /// # Errors
    /// - `FileNotFound` if there is no file at `database_path`
    /// - `SchemaMismatch` if any of Authors/Books/Borrows is missing
    pub async fn open<P: AsRef<Path>>(database_path: P, config: &LibraryConfig) -> Result<Self> {
        let path = database_path.as_ref();
        if !path.exists() {
            return Err(LibraryError::FileNotFound(path.display().to_string()));
        }

        let pool = Self::connect_file(path, config, false).await?;
        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };

        let counts = db.verify_structure().await?;
        info!(
            path = %path.display(),
            authors = counts.authors,
            books = counts.books,
            borrows = counts.borrows,
            "opened database"
        );

        Ok(db)
    }

    /// Create in-memory database with the schema but no sample data
    ///
    /// # Errors
    /// Returns error if database creation or migration fails
    pub async fn new_in_memory() -> Result<Self> {
        Self::in_memory(false).await
    }

    /// Create in-memory database with schema and sample data
    pub async fn new_in_memory_seeded() -> Result<Self> {
        Self::in_memory(true).await
    }

    async fn in_memory(seed: bool) -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .disable_statement_logging();

        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;

        let db = Self { pool, path: None };
        migrations::run_migrations(&db.pool, seed).await?;

        Ok(db)
    }

    async fn connect_file(path: &Path, config: &LibraryConfig, create: bool) -> Result<SqlitePool> {
        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(config.enforce_foreign_keys)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout())
            .disable_statement_logging();

        if !config.enforce_foreign_keys {
            warn!("foreign key enforcement disabled; dangling references will not be rejected");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        Ok(pool)
    }

    /// Apply the sample data migration (no-op when already applied)
    ///
    /// # Errors
    /// `InvalidState` if the library tables already hold rows; sample rows
    /// are never mixed into existing data.
    pub async fn seed_sample_data(&self) -> Result<bool> {
        if migrations::is_applied(&self.pool, migrations::Migration::SampleData).await? {
            return Ok(false);
        }

        let counts = queries::table_counts(&self.pool).await?;
        if counts != TableCounts::default() {
            return Err(LibraryError::InvalidState(format!(
                "cannot load sample data into a non-empty database \
                 ({} authors, {} books, {} borrows)",
                counts.authors, counts.books, counts.borrows
            )));
        }

        let applied = migrations::run_migrations(&self.pool, true).await?;
        Ok(applied.contains(&migrations::Migration::SampleData))
    }

    /// Verify that the required tables exist and report their row counts
    pub async fn verify_structure(&self) -> Result<TableCounts> {
        let existing: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&self.pool)
                .await?;

        let missing: Vec<String> = REQUIRED_TABLES
            .iter()
            .filter(|table| !existing.iter().any(|name| name == *table))
            .map(|table| table.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(LibraryError::SchemaMismatch { missing });
        }

        queries::table_counts(&self.pool).await
    }

    /// Check that the database accepts writes
    ///
    /// Inserts a test author, reads it back and rolls the transaction back,
    /// so neither the row nor the AUTOINCREMENT counter survives.
    pub async fn check_write_access(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO Authors (AuthorName, BirthYear) VALUES (?, ?)")
            .bind("Test Author")
            .bind(2000)
            .execute(&mut *tx)
            .await?;

        let name: Option<String> =
            sqlx::query_scalar("SELECT AuthorName FROM Authors WHERE AuthorID = ?")
                .bind(result.last_insert_rowid())
                .fetch_optional(&mut *tx)
                .await?;

        tx.rollback().await?;

        match name.as_deref() {
            Some("Test Author") => Ok(()),
            _ => Err(LibraryError::InvalidState(
                "write test row could not be read back".to_string(),
            )),
        }
    }

    /// Get reference to the connection pool
    ///
    /// Use this to execute queries directly on the pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database file path
    ///
    /// Returns `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close database and release all connections
    ///
    /// This will wait for all active connections to finish before closing.
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// Default database location: `libraryDB.sqlite` in the working directory
    pub fn get_default_path() -> PathBuf {
        PathBuf::from(crate::config::DEFAULT_DATABASE_FILE)
    }

    /// Vacuum database to reclaim unused space
    pub async fn vacuum(&self) -> Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Get database statistics
    ///
    /// Returns useful database information like page count, page size, etc.
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;

        let freelist_count: i64 = sqlx::query_scalar("PRAGMA freelist_count")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            page_count: page_count as u64,
            page_size: page_size as u64,
            freelist_count: freelist_count as u64,
            total_size: (page_count * page_size) as u64,
            unused_size: (freelist_count * page_size) as u64,
        })
    }

    /// Checkpoint WAL file to main database
    ///
    /// This writes all WAL changes back to the main database file.
    /// Useful before backup or export operations.
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Export database to file
    ///
    /// Creates a copy of the database at the specified path.
    /// Automatically checkpoints WAL before export.
    ///
    /// # Errors
    /// Returns error if:
    /// - Source database path is unknown (in-memory database)
    /// - Checkpoint fails
    /// - File copy fails
    pub async fn export<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let source_path = self
            .path
            .as_ref()
            .ok_or_else(|| {
                LibraryError::InvalidState("Cannot export in-memory database".to_string())
            })?;

        self.checkpoint().await?;
        std::fs::copy(source_path, output_path.as_ref())?;

        Ok(())
    }

    /// Check database integrity
    ///
    /// Runs SQLite integrity check and returns true if database is okay.
    pub async fn check_integrity(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }

    /// Quick integrity check
    ///
    /// Faster version of integrity_check that only checks key structures.
    pub async fn quick_check(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA quick_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }

    /// List rows whose foreign keys point at missing parents
    ///
    /// Only non-empty when rows were written with enforcement switched off.
    pub async fn foreign_key_check(&self) -> Result<Vec<ForeignKeyIssue>> {
        let issues: Vec<ForeignKeyIssue> = sqlx::query_as(
            r#"
            SELECT "table" AS table_name, rowid AS row_id, parent AS parent_table
            FROM pragma_foreign_key_check
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for issue in &issues {
            warn!(
                table = %issue.table_name,
                row_id = ?issue.row_id,
                parent = %issue.parent_table,
                "dangling foreign key reference"
            );
        }

        Ok(issues)
    }
}

/// A row referencing a parent row that no longer exists
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct ForeignKeyIssue {
    pub table_name: String,
    pub row_id: Option<i64>,
    pub parent_table: String,
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseStats {
    /// Total number of pages in database
    pub page_count: u64,
    /// Size of each page in bytes
    pub page_size: u64,
    /// Number of free pages (unused space)
    pub freelist_count: u64,
    /// Total size of database (page_count * page_size)
    pub total_size: u64,
    /// Unused space (freelist_count * page_size)
    pub unused_size: u64,
}

impl DatabaseStats {
    /// Get percentage of unused space
    pub fn unused_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.unused_size as f64 / self.total_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{LoanFilter, NewAuthor, NewBook};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new_in_memory().await.expect("Failed to create in-memory database");

        let result: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(db.pool())
            .await
            .expect("Failed to query database");

        assert_eq!(result, 1);
        assert!(db.path().is_none());
    }

    #[tokio::test]
    async fn test_verify_structure_counts() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        assert_eq!(db.verify_structure().await.unwrap(), TableCounts::default());

        let db = Database::new_in_memory_seeded().await.expect("Failed to create database");
        let counts = db.verify_structure().await.unwrap();
        assert_eq!((counts.authors, counts.books, counts.borrows), (5, 8, 5));
    }

    #[tokio::test]
    async fn test_verify_structure_reports_missing_tables() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        sqlx::query("DROP TABLE Borrows").execute(db.pool()).await.unwrap();

        match db.verify_structure().await {
            Err(LibraryError::SchemaMismatch { missing }) => assert_eq!(missing, vec!["Borrows"]),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_check_leaves_no_trace() {
        let db = Database::new_in_memory_seeded().await.expect("Failed to create database");
        db.check_write_access().await.expect("Write check failed");

        let counts = db.verify_structure().await.unwrap();
        assert_eq!(counts.authors, 5);

        // Identity counter was rolled back along with the row
        let id = queries::insert_author(db.pool(), &NewAuthor::new("Next".to_string()))
            .await
            .unwrap();
        assert_eq!(id, 6);
    }

    #[tokio::test]
    async fn test_seed_sample_data_is_idempotent() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        assert!(db.seed_sample_data().await.unwrap());
        assert!(!db.seed_sample_data().await.unwrap());
        assert_eq!(queries::count_books(db.pool()).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_seed_refuses_non_empty_database() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        queries::insert_book(db.pool(), &NewBook::new("Dune".to_string())).await.unwrap();

        let err = db.seed_sample_data().await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidState(_)), "got {:?}", err);
        assert_eq!(queries::count_books(db.pool()).await.unwrap(), 1);
        assert_eq!(queries::count_borrows(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_links_rows_by_assigned_ids() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        // Advance both identity counters, then empty the tables again
        let author_id = queries::insert_author(db.pool(), &NewAuthor::new("Temp".to_string()))
            .await
            .unwrap();
        let book_id = queries::insert_book(db.pool(), &NewBook::new("Dune".to_string()))
            .await
            .unwrap();
        queries::delete_book(db.pool(), book_id).await.unwrap();
        queries::delete_author(db.pool(), author_id).await.unwrap();

        assert!(db.seed_sample_data().await.expect("Failed to seed"));

        let loans = queries::list_loans(db.pool(), LoanFilter::All).await.unwrap();
        let alice = loans.iter().find(|l| l.borrower_name == "Alice Johnson").unwrap();
        assert_eq!(alice.title, "Harry Potter and the Philosopher's Stone");
        assert_eq!(alice.book_id, 2);
        let bob = loans.iter().find(|l| l.borrower_name == "Bob Smith").unwrap();
        assert_eq!(bob.title, "1984");

        let books = queries::list_books_with_authors(db.pool()).await.unwrap();
        let shining = books.iter().find(|b| b.title == "The Shining").unwrap();
        assert_eq!(shining.author_name.as_deref(), Some("Stephen King"));
        assert_eq!(shining.author_id, Some(5));
    }

    #[tokio::test]
    async fn test_database_stats() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let stats = db.get_stats().await.expect("Failed to get stats");

        assert!(stats.page_size > 0);
        assert!(stats.page_count > 0);
    }

    #[tokio::test]
    async fn test_integrity_check() {
        let db = Database::new_in_memory_seeded().await.expect("Failed to create database");
        assert!(db.check_integrity().await.expect("Failed to check integrity"));
        assert!(db.quick_check().await.expect("Failed to run quick check"));
        assert!(db.foreign_key_check().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_in_memory_is_rejected() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let err = db.export("/tmp/never-written.sqlite").await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_file_maintenance() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("library.sqlite");
        let db = Database::create(&path, &LibraryConfig::default())
            .await
            .expect("Failed to create database");
        assert_eq!(db.path(), Some(path.as_path()));

        queries::delete_book(db.pool(), 8).await.unwrap();
        db.checkpoint().await.expect("Failed to checkpoint");
        db.vacuum().await.expect("Failed to vacuum");
        assert_eq!(db.get_stats().await.unwrap().freelist_count, 0);

        db.close().await.unwrap();
        assert_eq!(Database::get_default_path(), PathBuf::from("libraryDB.sqlite"));
    }
}
