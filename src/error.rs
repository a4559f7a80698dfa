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


//! Error types for the library database
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they originate:
//!
//! ### Setup (database file and schema)
//! - Database file missing when opening → `FileNotFound`
//! - Tables absent because the setup script never ran → `SchemaMismatch`
//! - Setup script failed part way → `MigrationFailed`
//!
//! ### Constraints (reported by SQLite at the offending statement)
//! - `FOREIGN KEY constraint failed` → `ForeignKeyViolation`
//! - `NOT NULL constraint failed` → `NotNullViolation`
//! - Any other constraint → `ConstraintViolation`
//!
//! ### Loan workflow
//! - Book already has an open loan → `BookAlreadyBorrowed`
//! - Returning an unknown or closed loan → `NoOutstandingLoan`
//!
//! Nothing here is retried. Setup errors need manual remediation
//! (re-run `library-cli init` or point `--database` at the right file).

use thiserror::Error;

/// Result type alias using our LibraryError type
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Main error type for the library database
#[derive(Error, Debug)]
pub enum LibraryError {
    // ===== Setup Errors =====

    /// Database file does not exist (opening never creates it)
    #[error("Database file not found: {0}")]
    FileNotFound(String),

    /// Required tables are missing from the database
    #[error("Database schema mismatch: missing tables {}", .missing.join(", "))]
    SchemaMismatch {
        /// Names of the tables that could not be found
        missing: Vec<String>,
    },

    /// Setup script (schema or seed migration) failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    // ===== Constraint Errors =====

    /// Row references a parent that does not exist
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// Required column left empty
    #[error("Required column missing: {0}")]
    NotNullViolation(String),

    /// Any other constraint reported by the storage engine
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    // ===== Record / Workflow Errors =====

    /// Database record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// The book already has an open loan
    #[error("Book {book_id} is currently borrowed by {borrower}")]
    BookAlreadyBorrowed {
        book_id: i64,
        borrower: String,
    },

    /// No open loan exists with the given borrow id
    #[error("No outstanding borrow found with id {0}")]
    NoOutstandingLoan(i64),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== Configuration/State Errors =====

    /// Configuration file or value is invalid
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Operation not possible in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== External Library Errors =====

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[source] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// Constraint failures are lifted out of the generic driver error so callers
// can match on them without digging into sqlx.
impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(db_err) = &err {
            let message = db_err.message().to_string();
            match db_err.kind() {
                ErrorKind::ForeignKeyViolation => return LibraryError::ForeignKeyViolation(message),
                ErrorKind::NotNullViolation => return LibraryError::NotNullViolation(message),
                ErrorKind::UniqueViolation | ErrorKind::CheckViolation => {
                    return LibraryError::ConstraintViolation(message)
                }
                _ => {}
            }
        }
        LibraryError::SqlxError(err)
    }
}

impl From<std::num::ParseIntError> for LibraryError {
    fn from(err: std::num::ParseIntError) -> Self {
        LibraryError::InvalidInput(format!("Failed to parse integer: {}", err))
    }
}

impl From<chrono::ParseError> for LibraryError {
    fn from(err: chrono::ParseError) -> Self {
        LibraryError::InvalidInput(format!("Failed to parse date (expected YYYY-MM-DD): {}", err))
    }
}

// Helper methods for creating common errors
impl LibraryError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        LibraryError::RecordNotFound(resource.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        LibraryError::InvalidInput(message.into())
    }

    /// Check if error was raised by a schema constraint
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            LibraryError::ForeignKeyViolation(_)
                | LibraryError::NotNullViolation(_)
                | LibraryError::ConstraintViolation(_)
        )
    }

    /// Check if the database needs to be (re)initialised before use
    ///
    /// These cannot be recovered from automatically: the setup script has to
    /// be run again or the database file relocated.
    pub fn needs_setup(&self) -> bool {
        matches!(
            self,
            LibraryError::FileNotFound(_)
                | LibraryError::SchemaMismatch { .. }
                | LibraryError::MigrationFailed(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            LibraryError::FileNotFound(path) => {
                format!(
                    "Database file '{}' not found. Run `library-cli init` to create it, \
                     or pass --database with the correct location.",
                    path
                )
            }
            LibraryError::SchemaMismatch { missing } => {
                format!(
                    "The database is missing tables: {}. Run `library-cli init` against it \
                     to apply the setup script.",
                    missing.join(", ")
                )
            }
            LibraryError::ForeignKeyViolation(_) => {
                "That record refers to an author or book that does not exist.".to_string()
            }
            LibraryError::NotNullViolation(message) => {
                format!("A required value was left empty ({}).", message)
            }
            LibraryError::BookAlreadyBorrowed { borrower, .. } => {
                format!("Sorry, this book is currently borrowed by {}.", borrower)
            }
            _ => self.to_string(),
        }
    }
}
