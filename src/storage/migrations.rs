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


//! Database setup script
//!
//! The schema and the sample data are applied as two tracked migrations so
//! running setup against an already initialised database changes nothing.
//!
//! # Migration Strategy
//! sqlx's compile-time `migrate!` needs the SQL files at build time; the
//! statements live here instead and are executed at runtime. Applied
//! migrations are recorded in the `_migrations` table.

use crate::error::{LibraryError, Result};
use crate::storage::seed;
use sqlx::{Executor, SqlitePool};
use tracing::{debug, info};

/// Tables the application cannot work without
pub const REQUIRED_TABLES: [&str; 3] = ["Authors", "Books", "Borrows"];

/// Schema for the three library tables
///
/// `Books.AuthorID` uses `ON DELETE SET NULL`: removing an author keeps the
/// books and clears the reference. `Borrows.BookID` cascades, so deleting a
/// book removes its borrow history. Both rules only fire while
/// `PRAGMA foreign_keys` is on.
pub const SCHEMA_SQL: &str = r#"
-- Authors table: people who wrote the books
CREATE TABLE IF NOT EXISTS Authors (
    AuthorID INTEGER PRIMARY KEY AUTOINCREMENT,
    AuthorName TEXT NOT NULL,
    BirthYear INTEGER
);

-- Books table: catalogue entries, optionally linked to an author
CREATE TABLE IF NOT EXISTS Books (
    BookID INTEGER PRIMARY KEY AUTOINCREMENT,
    Title TEXT NOT NULL,
    PublicationYear INTEGER,
    AuthorID INTEGER,
    FOREIGN KEY (AuthorID) REFERENCES Authors(AuthorID) ON DELETE SET NULL
);

-- Borrows table: one row per loan, ReturnDate NULL while the book is out
CREATE TABLE IF NOT EXISTS Borrows (
    BorrowID INTEGER PRIMARY KEY AUTOINCREMENT,
    BookID INTEGER NOT NULL,
    BorrowerName TEXT NOT NULL,
    DateBorrowed TEXT NOT NULL,  -- ISO 8601 date (YYYY-MM-DD)
    ReturnDate TEXT,             -- ISO 8601 date, NULL = open loan
    FOREIGN KEY (BookID) REFERENCES Books(BookID) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_authors_name ON Authors(AuthorName);
CREATE INDEX IF NOT EXISTS idx_books_title ON Books(Title);
CREATE INDEX IF NOT EXISTS idx_books_author ON Books(AuthorID);
CREATE INDEX IF NOT EXISTS idx_borrows_book ON Borrows(BookID);
CREATE INDEX IF NOT EXISTS idx_borrows_return_date ON Borrows(ReturnDate);
"#;

/// A single step of the setup script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    InitialSchema,
    SampleData,
}

impl Migration {
    pub fn id(&self) -> i32 {
        match self {
            Migration::InitialSchema => 1,
            Migration::SampleData => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Migration::InitialSchema => "initial_schema",
            Migration::SampleData => "sample_data",
        }
    }
}

/// Run the setup script
///
/// Always applies the schema; the sample rows are added only when `seed` is
/// true and the library tables are empty. Returns the migrations that were
/// actually applied by this call.
pub async fn run_migrations(pool: &SqlitePool, seed: bool) -> Result<Vec<Migration>> {
    create_migrations_table(pool).await?;

    let mut applied = Vec::new();
    if run_migration(pool, Migration::InitialSchema).await? {
        applied.push(Migration::InitialSchema);
    }
    if seed && run_migration(pool, Migration::SampleData).await? {
        applied.push(Migration::SampleData);
    }

    Ok(applied)
}

/// Check whether a migration has been recorded
pub async fn is_applied(pool: &SqlitePool, migration: Migration) -> Result<bool> {
    let exists: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_migrations'",
    )
    .fetch_optional(pool)
    .await?;
    if exists.is_none() {
        return Ok(false);
    }

    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(migration.id())
        .fetch_optional(pool)
        .await?;

    Ok(applied.is_some())
}

/// Create migrations tracking table
async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Run a single migration if it hasn't been applied yet
///
/// The migration body and its bookkeeping row share one transaction, so a
/// failure leaves neither behind.
async fn run_migration(pool: &SqlitePool, migration: Migration) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(migration.id())
        .fetch_optional(&mut *tx)
        .await?;

    if applied.is_some() {
        debug!(migration = migration.name(), "migration already applied");
        return Ok(false);
    }

    let outcome = match migration {
        Migration::InitialSchema => (&mut *tx)
            .execute(SCHEMA_SQL)
            .await
            .map(|_| true)
            .map_err(LibraryError::from),
        Migration::SampleData => seed::insert_sample_data(&mut tx).await,
    };
    let changed = outcome
        .map_err(|e| LibraryError::MigrationFailed(format!("{}: {}", migration.name(), e)))?;

    // Left pending so it can run once the tables are empty
    if !changed {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(migration.id())
        .bind(migration.name())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(migration = migration.name(), "applied database migration");

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[tokio::test]
    async fn test_migrations() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        // Verify tables exist
        let tables: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != '_migrations'
            ORDER BY name
            "#,
        )
        .fetch_all(db.pool())
        .await
        .expect("Failed to query tables");

        assert_eq!(tables, vec!["Authors", "Books", "Borrows"], "Missing or extra tables");
    }

    #[tokio::test]
    async fn test_migration_tracking() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        assert!(is_applied(db.pool(), Migration::InitialSchema).await.unwrap());
        assert!(!is_applied(db.pool(), Migration::SampleData).await.unwrap());

        // Second run applies only the seed, third run applies nothing
        let applied = run_migrations(db.pool(), true).await.expect("Failed to seed");
        assert_eq!(applied, vec![Migration::SampleData]);

        let applied = run_migrations(db.pool(), true).await.expect("Failed to rerun");
        assert!(applied.is_empty());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .expect("Failed to query migrations");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_sample_data_stays_pending_on_existing_rows() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");
        sqlx::query("INSERT INTO Authors (AuthorName) VALUES ('Mary Shelley')")
            .execute(db.pool())
            .await
            .unwrap();

        let applied = run_migrations(db.pool(), true).await.expect("Failed to rerun");
        assert!(applied.is_empty());
        assert!(!is_applied(db.pool(), Migration::SampleData).await.unwrap());

        let authors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Authors")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(authors, 1);

        // Once the tables are empty again the seed goes in
        sqlx::query("DELETE FROM Authors").execute(db.pool()).await.unwrap();
        let applied = run_migrations(db.pool(), true).await.expect("Failed to seed");
        assert_eq!(applied, vec![Migration::SampleData]);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        let fk_enabled: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("Failed to check foreign keys");

        assert_eq!(fk_enabled, 1, "Foreign keys not enabled");
    }

    #[tokio::test]
    async fn test_declared_delete_rules() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        let rules: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT m.name, f.on_delete
            FROM sqlite_master m, pragma_foreign_key_list(m.name) f
            WHERE m.type = 'table' AND m.name IN ('Books', 'Borrows')
            ORDER BY m.name
            "#,
        )
        .fetch_all(db.pool())
        .await
        .expect("Failed to read foreign keys");

        assert_eq!(
            rules,
            vec![
                ("Books".to_string(), "SET NULL".to_string()),
                ("Borrows".to_string(), "CASCADE".to_string()),
            ]
        );
    }
}
