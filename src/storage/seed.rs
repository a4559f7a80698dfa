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


//! Sample data loaded by the setup script
//!
//! Books name their author and borrows name their book by 1-based position in
//! the lists below. The positions are resolved to the identities SQLite hands
//! out while inserting, so on a fresh database authors are 1-5, books 1-8 and
//! borrows 1-5. Sample rows are only added to empty library tables.

use crate::error::{LibraryError, Result};
use sqlx::{Sqlite, Transaction};
use tracing::warn;

/// (name, birth year)
pub const SAMPLE_AUTHORS: [(&str, i32); 5] = [
    ("J.K. Rowling", 1965),
    ("George Orwell", 1903),
    ("Jane Austen", 1775),
    ("Stephen King", 1947),
    ("Agatha Christie", 1890),
];

/// (title, publication year, author position in `SAMPLE_AUTHORS`)
pub const SAMPLE_BOOKS: [(&str, i32, usize); 8] = [
    ("Harry Potter and the Philosopher's Stone", 1997, 1),
    ("Harry Potter and the Chamber of Secrets", 1998, 1),
    ("1984", 1949, 2),
    ("Animal Farm", 1945, 2),
    ("Pride and Prejudice", 1813, 3),
    ("The Shining", 1977, 4),
    ("Murder on the Orient Express", 1934, 5),
    ("And Then There Were None", 1939, 5),
];

/// (book position in `SAMPLE_BOOKS`, borrower, date borrowed, return date)
pub const SAMPLE_BORROWS: [(usize, &str, &str, Option<&str>); 5] = [
    (1, "Alice Johnson", "2024-01-15", Some("2024-01-29")),
    (3, "Bob Smith", "2024-02-01", None),
    (5, "Carol Williams", "2024-02-10", Some("2024-02-24")),
    (7, "David Brown", "2024-03-05", None),
    (2, "Emma Davis", "2024-03-12", None),
];

/// Books (by position, equal to BookID on a fresh database) out on loan
/// right after seeding
pub const SAMPLE_OPEN_LOAN_BOOKS: [i64; 3] = [3, 7, 2];

/// Insert every sample row inside the caller's transaction
///
/// Returns `false` without touching anything when any library table already
/// holds rows.
pub(crate) async fn insert_sample_data(tx: &mut Transaction<'_, Sqlite>) -> Result<bool> {
    let existing: i64 = sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM Authors) + (SELECT COUNT(*) FROM Books) \
         + (SELECT COUNT(*) FROM Borrows)",
    )
    .fetch_one(&mut **tx)
    .await?;
    if existing > 0 {
        warn!(existing, "library tables already hold rows; sample data skipped");
        return Ok(false);
    }

    let mut author_ids = Vec::with_capacity(SAMPLE_AUTHORS.len());
    for (name, birth_year) in SAMPLE_AUTHORS {
        let result = sqlx::query("INSERT INTO Authors (AuthorName, BirthYear) VALUES (?, ?)")
            .bind(name)
            .bind(birth_year)
            .execute(&mut **tx)
            .await?;
        author_ids.push(result.last_insert_rowid());
    }

    let mut book_ids = Vec::with_capacity(SAMPLE_BOOKS.len());
    for (title, year, author) in SAMPLE_BOOKS {
        let result =
            sqlx::query("INSERT INTO Books (Title, PublicationYear, AuthorID) VALUES (?, ?, ?)")
                .bind(title)
                .bind(year)
                .bind(resolve(&author_ids, author, "author")?)
                .execute(&mut **tx)
                .await?;
        book_ids.push(result.last_insert_rowid());
    }

    // Dates are literal ISO 8601 text, exactly as they should be stored
    for (book, borrower, borrowed, returned) in SAMPLE_BORROWS {
        sqlx::query(
            "INSERT INTO Borrows (BookID, BorrowerName, DateBorrowed, ReturnDate) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(resolve(&book_ids, book, "book")?)
        .bind(borrower)
        .bind(borrowed)
        .bind(returned)
        .execute(&mut **tx)
        .await?;
    }

    Ok(true)
}

/// Map a 1-based sample position to the identity inserted for it
fn resolve(ids: &[i64], position: usize, kind: &str) -> Result<i64> {
    position
        .checked_sub(1)
        .and_then(|index| ids.get(index))
        .copied()
        .ok_or_else(|| {
            LibraryError::InvalidState(format!("no sample {} at position {}", kind, position))
        })
}
