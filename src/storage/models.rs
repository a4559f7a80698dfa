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


//! Database models
//!
//! Row types for the three tables plus the joined views the application
//! reads most often.
//!
//! # SQLite Adaptations
//! - Column names keep the setup script's PascalCase (`AuthorID`, `Title`, ...),
//!   mapped onto snake_case fields with `#[sqlx(rename)]`
//! - Dates stored as TEXT in ISO 8601 format (`YYYY-MM-DD`)
//! - Loan state is not stored; it is derived from `ReturnDate` being NULL

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// ENUMS
// ============================================================================

/// Two-state loan lifecycle: OPEN until a return date is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Open,
    Closed,
}

impl LoanStatus {
    pub fn from_return_date(return_date: Option<NaiveDate>) -> Self {
        match return_date {
            Some(_) => LoanStatus::Closed,
            None => LoanStatus::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => "open",
            LoanStatus::Closed => "closed",
        }
    }
}

/// Which borrow records a loan listing should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoanFilter {
    /// Only loans without a return date
    #[default]
    Outstanding,
    /// Full borrow history
    All,
}

// ============================================================================
// MAIN ENTITIES
// ============================================================================

/// Author row
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Author {
    /// Primary key (auto-increment)
    #[sqlx(rename = "AuthorID")]
    pub author_id: i64,
    #[sqlx(rename = "AuthorName")]
    pub name: String,
    #[sqlx(rename = "BirthYear")]
    pub birth_year: Option<i32>,
}

/// Book row
///
/// `author_id` is optional: a book may have no recorded author, and deleting
/// an author clears it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Book {
    /// Primary key (auto-increment)
    #[sqlx(rename = "BookID")]
    pub book_id: i64,
    #[sqlx(rename = "Title")]
    pub title: String,
    #[sqlx(rename = "PublicationYear")]
    pub publication_year: Option<i32>,
    #[sqlx(rename = "AuthorID")]
    pub author_id: Option<i64>,
}

/// Borrow row - one loan of one book
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Borrow {
    /// Primary key (auto-increment)
    #[sqlx(rename = "BorrowID")]
    pub borrow_id: i64,
    #[sqlx(rename = "BookID")]
    pub book_id: i64,
    #[sqlx(rename = "BorrowerName")]
    pub borrower_name: String,
    #[sqlx(rename = "DateBorrowed")]
    pub date_borrowed: NaiveDate,
    /// `None` while the book is still out
    #[sqlx(rename = "ReturnDate")]
    pub return_date: Option<NaiveDate>,
}

impl Borrow {
    pub fn status(&self) -> LoanStatus {
        LoanStatus::from_return_date(self.return_date)
    }

    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

// ============================================================================
// JOINED VIEWS
// ============================================================================

/// Book joined (left) with its author's name
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BookWithAuthor {
    pub book_id: i64,
    pub title: String,
    pub publication_year: Option<i32>,
    pub author_id: Option<i64>,
    /// `None` when the book has no author or the reference dangles
    pub author_name: Option<String>,
}

/// Borrow joined with the title of the borrowed book
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LoanRecord {
    pub borrow_id: i64,
    pub book_id: i64,
    pub title: String,
    pub borrower_name: String,
    pub date_borrowed: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl LoanRecord {
    pub fn status(&self) -> LoanStatus {
        LoanStatus::from_return_date(self.return_date)
    }
}

/// Row counts of the three library tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableCounts {
    pub authors: i64,
    pub books: i64,
    pub borrows: i64,
}

// ============================================================================
// NEW RECORD STRUCTS (for inserts)
// ============================================================================

/// New author record for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    pub birth_year: Option<i32>,
}

impl NewAuthor {
    pub fn new(name: String) -> Self {
        Self {
            name,
            birth_year: None,
        }
    }

    pub fn with_birth_year(mut self, birth_year: i32) -> Self {
        self.birth_year = Some(birth_year);
        self
    }
}

/// New book record for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub publication_year: Option<i32>,
    pub author_id: Option<i64>,
}

impl NewBook {
    pub fn new(title: String) -> Self {
        Self {
            title,
            publication_year: None,
            author_id: None,
        }
    }

    pub fn with_publication_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

/// New borrow record for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBorrow {
    pub book_id: i64,
    pub borrower_name: String,
    pub date_borrowed: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl NewBorrow {
    /// An open loan starting on `date_borrowed`
    pub fn new(book_id: i64, borrower_name: String, date_borrowed: NaiveDate) -> Self {
        Self {
            book_id,
            borrower_name,
            date_borrowed,
            return_date: None,
        }
    }

    pub fn returned_on(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }
}
