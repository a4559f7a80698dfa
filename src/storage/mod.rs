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


//! Database storage and models
//!
//! This module handles all database operations using SQLite through sqlx.
//!
//! # Database Schema
//! - Authors: name and optional birth year
//! - Books: title, optional publication year, optional author reference
//! - Borrows: loans of a book; `ReturnDate` NULL while the book is out
//!
//! Deleting a book cascades to its borrows. Deleting an author clears
//! `Books.AuthorID` for the author's books.
//!
//! # Usage Example
//! ```no_run
//! use library_core::storage::{Database, queries, models::NewBook};
//! use library_core::LibraryConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LibraryConfig::default();
//! let db = Database::create("./libraryDB.sqlite", &config).await?;
//!
//! let book_id = queries::insert_book(db.pool(), &NewBook::new("Dune".to_string())).await?;
//! let book = queries::find_book_by_id(db.pool(), book_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod seed;

// Re-export commonly used types
pub use database::{Database, DatabaseStats, ForeignKeyIssue};
pub use models::{
    Author, Book, BookWithAuthor, Borrow, LoanFilter, LoanRecord, LoanStatus, NewAuthor, NewBook,
    NewBorrow, TableCounts,
};
