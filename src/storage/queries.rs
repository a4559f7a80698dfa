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


//! Database query functions
//!
//! Free functions over a `SqlitePool`, grouped per table. Identity keys are
//! always assigned by SQLite and returned to the caller.
//!
//! # Query Patterns
//! - Plain inserts/updates/deletes map 1:1 onto SQL statements; constraint
//!   failures come back as `LibraryError` constraint variants
//! - The loan workflow (`borrow_book`, `return_book`) adds the application
//!   checks the schema does not express, inside a single transaction

use crate::error::{LibraryError, Result};
use crate::storage::models::*;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

const BOOK_WITH_AUTHOR_SELECT: &str = r#"
    SELECT
        b.BookID AS book_id,
        b.Title AS title,
        b.PublicationYear AS publication_year,
        b.AuthorID AS author_id,
        a.AuthorName AS author_name
    FROM Books b
    LEFT JOIN Authors a ON b.AuthorID = a.AuthorID
"#;

const LOAN_SELECT: &str = r#"
    SELECT
        br.BorrowID AS borrow_id,
        br.BookID AS book_id,
        b.Title AS title,
        br.BorrowerName AS borrower_name,
        br.DateBorrowed AS date_borrowed,
        br.ReturnDate AS return_date
    FROM Borrows br
    JOIN Books b ON br.BookID = b.BookID
"#;

// ============================================================================
// AUTHOR QUERIES
// ============================================================================

/// Insert a new author
///
/// Returns the AuthorID assigned by SQLite.
pub async fn insert_author(pool: &SqlitePool, author: &NewAuthor) -> Result<i64> {
    let result = sqlx::query("INSERT INTO Authors (AuthorName, BirthYear) VALUES (?, ?)")
        .bind(&author.name)
        .bind(author.birth_year)
        .execute(pool)
        .await?;

    let author_id = result.last_insert_rowid();
    debug!(author_id, name = %author.name, "inserted author");
    Ok(author_id)
}

/// Find author by ID
pub async fn find_author_by_id(pool: &SqlitePool, author_id: i64) -> Result<Option<Author>> {
    let author = sqlx::query_as::<_, Author>("SELECT * FROM Authors WHERE AuthorID = ?")
        .bind(author_id)
        .fetch_optional(pool)
        .await?;

    Ok(author)
}

/// List all authors ordered by name
pub async fn list_authors(pool: &SqlitePool) -> Result<Vec<Author>> {
    let authors = sqlx::query_as::<_, Author>("SELECT * FROM Authors ORDER BY AuthorName, AuthorID")
        .fetch_all(pool)
        .await?;

    Ok(authors)
}

/// Search authors by name
pub async fn search_authors_by_name(pool: &SqlitePool, query: &str) -> Result<Vec<Author>> {
    let search_pattern = format!("%{}%", query);
    let authors = sqlx::query_as::<_, Author>(
        "SELECT * FROM Authors WHERE AuthorName LIKE ? ORDER BY AuthorName, AuthorID",
    )
    .bind(&search_pattern)
    .fetch_all(pool)
    .await?;

    Ok(authors)
}

/// Update an author's name and birth year
pub async fn update_author(pool: &SqlitePool, author: &Author) -> Result<()> {
    let result = sqlx::query("UPDATE Authors SET AuthorName = ?, BirthYear = ? WHERE AuthorID = ?")
        .bind(&author.name)
        .bind(author.birth_year)
        .bind(author.author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LibraryError::not_found(format!("author {}", author.author_id)));
    }

    debug!(author_id = author.author_id, "updated author");
    Ok(())
}

/// Count books that reference an author
pub async fn count_books_by_author(pool: &SqlitePool, author_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Books WHERE AuthorID = ?")
        .bind(author_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Delete an author
///
/// With foreign keys enforced, the author's books stay and lose their
/// AuthorID (`ON DELETE SET NULL`). Returns the number of rows removed.
pub async fn delete_author(pool: &SqlitePool, author_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM Authors WHERE AuthorID = ?")
        .bind(author_id)
        .execute(pool)
        .await?;

    debug!(author_id, rows = result.rows_affected(), "deleted author");
    Ok(result.rows_affected())
}

/// Count total authors
pub async fn count_authors(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Authors")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ============================================================================
// BOOK QUERIES
// ============================================================================

/// Insert a new book
///
/// Returns the BookID assigned by SQLite.
pub async fn insert_book(pool: &SqlitePool, book: &NewBook) -> Result<i64> {
    let result =
        sqlx::query("INSERT INTO Books (Title, PublicationYear, AuthorID) VALUES (?, ?, ?)")
            .bind(&book.title)
            .bind(book.publication_year)
            .bind(book.author_id)
            .execute(pool)
            .await?;

    let book_id = result.last_insert_rowid();
    debug!(book_id, title = %book.title, "inserted book");
    Ok(book_id)
}

/// Find book by ID
pub async fn find_book_by_id(pool: &SqlitePool, book_id: i64) -> Result<Option<Book>> {
    let book = sqlx::query_as::<_, Book>("SELECT * FROM Books WHERE BookID = ?")
        .bind(book_id)
        .fetch_optional(pool)
        .await?;

    Ok(book)
}

/// List all books in insertion order (no join)
pub async fn list_books(pool: &SqlitePool) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>("SELECT * FROM Books ORDER BY BookID")
        .fetch_all(pool)
        .await?;

    Ok(books)
}

/// List all books with their author's name, ordered by title
pub async fn list_books_with_authors(pool: &SqlitePool) -> Result<Vec<BookWithAuthor>> {
    let sql = format!("{} ORDER BY b.Title, b.BookID", BOOK_WITH_AUTHOR_SELECT);
    let books = sqlx::query_as::<_, BookWithAuthor>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(books)
}

/// List the books written by one author
pub async fn list_books_by_author(pool: &SqlitePool, author_id: i64) -> Result<Vec<Book>> {
    let books = sqlx::query_as::<_, Book>(
        "SELECT * FROM Books WHERE AuthorID = ? ORDER BY Title, BookID",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    Ok(books)
}

/// Search books by title
pub async fn search_books_by_title(pool: &SqlitePool, query: &str) -> Result<Vec<BookWithAuthor>> {
    let search_pattern = format!("%{}%", query);
    let sql = format!(
        "{} WHERE b.Title LIKE ? ORDER BY b.Title, b.BookID",
        BOOK_WITH_AUTHOR_SELECT
    );
    let books = sqlx::query_as::<_, BookWithAuthor>(&sql)
        .bind(&search_pattern)
        .fetch_all(pool)
        .await?;

    Ok(books)
}

/// Change a book's title
pub async fn update_book_title(pool: &SqlitePool, book_id: i64, title: &str) -> Result<()> {
    let result = sqlx::query("UPDATE Books SET Title = ? WHERE BookID = ?")
        .bind(title)
        .bind(book_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(LibraryError::not_found(format!("book {}", book_id)));
    }

    debug!(book_id, title, "renamed book");
    Ok(())
}

/// Delete a book (and its borrow history via CASCADE)
///
/// Returns the number of book rows removed.
pub async fn delete_book(pool: &SqlitePool, book_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM Books WHERE BookID = ?")
        .bind(book_id)
        .execute(pool)
        .await?;

    debug!(book_id, rows = result.rows_affected(), "deleted book");
    Ok(result.rows_affected())
}

/// Count total books
pub async fn count_books(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Books")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ============================================================================
// BORROW QUERIES
// ============================================================================

/// Insert a borrow row as-is
///
/// No availability check: the schema allows several open loans per book.
/// Use [`borrow_book`] for the checked workflow.
pub async fn insert_borrow(pool: &SqlitePool, borrow: &NewBorrow) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO Borrows (BookID, BorrowerName, DateBorrowed, ReturnDate) VALUES (?, ?, ?, ?)",
    )
    .bind(borrow.book_id)
    .bind(&borrow.borrower_name)
    .bind(borrow.date_borrowed)
    .bind(borrow.return_date)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Start a loan
///
/// Fails with `RecordNotFound` for an unknown book and `BookAlreadyBorrowed`
/// while another loan of the same book is open. Returns the new BorrowID.
pub async fn borrow_book(
    pool: &SqlitePool,
    book_id: i64,
    borrower_name: &str,
    date_borrowed: NaiveDate,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT BookID FROM Books WHERE BookID = ?")
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(LibraryError::not_found(format!("book {}", book_id)));
    }

    let current: Option<String> = sqlx::query_scalar(
        "SELECT BorrowerName FROM Borrows WHERE BookID = ? AND ReturnDate IS NULL LIMIT 1",
    )
    .bind(book_id)
    .fetch_optional(&mut *tx)
    .await?;
    if let Some(borrower) = current {
        return Err(LibraryError::BookAlreadyBorrowed { book_id, borrower });
    }

    let result =
        sqlx::query("INSERT INTO Borrows (BookID, BorrowerName, DateBorrowed) VALUES (?, ?, ?)")
            .bind(book_id)
            .bind(borrower_name)
            .bind(date_borrowed)
            .execute(&mut *tx)
            .await?;

    tx.commit().await?;

    let borrow_id = result.last_insert_rowid();
    debug!(borrow_id, book_id, borrower = borrower_name, "opened loan");
    Ok(borrow_id)
}

/// Close an open loan by recording its return date
///
/// Closed loans cannot be returned again; unknown or closed ids give
/// `NoOutstandingLoan`. Returns the loan as it now reads.
pub async fn return_book(
    pool: &SqlitePool,
    borrow_id: i64,
    return_date: NaiveDate,
) -> Result<LoanRecord> {
    let result = sqlx::query(
        "UPDATE Borrows SET ReturnDate = ? WHERE BorrowID = ? AND ReturnDate IS NULL",
    )
    .bind(return_date)
    .bind(borrow_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LibraryError::NoOutstandingLoan(borrow_id));
    }

    debug!(borrow_id, %return_date, "closed loan");
    find_loan_by_id(pool, borrow_id)
        .await?
        .ok_or_else(|| LibraryError::not_found(format!("borrow {}", borrow_id)))
}

/// Find borrow by ID
pub async fn find_borrow_by_id(pool: &SqlitePool, borrow_id: i64) -> Result<Option<Borrow>> {
    let borrow = sqlx::query_as::<_, Borrow>("SELECT * FROM Borrows WHERE BorrowID = ?")
        .bind(borrow_id)
        .fetch_optional(pool)
        .await?;

    Ok(borrow)
}

/// Find a loan (borrow joined with its book) by BorrowID
pub async fn find_loan_by_id(pool: &SqlitePool, borrow_id: i64) -> Result<Option<LoanRecord>> {
    let sql = format!("{} WHERE br.BorrowID = ?", LOAN_SELECT);
    let loan = sqlx::query_as::<_, LoanRecord>(&sql)
        .bind(borrow_id)
        .fetch_optional(pool)
        .await?;

    Ok(loan)
}

/// Find the open loan of a book, if any
pub async fn find_open_borrow_for_book(pool: &SqlitePool, book_id: i64) -> Result<Option<Borrow>> {
    let borrow = sqlx::query_as::<_, Borrow>(
        "SELECT * FROM Borrows WHERE BookID = ? AND ReturnDate IS NULL ORDER BY BorrowID LIMIT 1",
    )
    .bind(book_id)
    .fetch_optional(pool)
    .await?;

    Ok(borrow)
}

/// Borrow history of one book, oldest first
pub async fn list_borrows_for_book(pool: &SqlitePool, book_id: i64) -> Result<Vec<Borrow>> {
    let borrows = sqlx::query_as::<_, Borrow>(
        "SELECT * FROM Borrows WHERE BookID = ? ORDER BY DateBorrowed, BorrowID",
    )
    .bind(book_id)
    .fetch_all(pool)
    .await?;

    Ok(borrows)
}

/// List loans, newest first
pub async fn list_loans(pool: &SqlitePool, filter: LoanFilter) -> Result<Vec<LoanRecord>> {
    let where_clause = match filter {
        LoanFilter::Outstanding => "WHERE br.ReturnDate IS NULL",
        LoanFilter::All => "",
    };
    let sql = format!(
        "{} {} ORDER BY br.DateBorrowed DESC, br.BorrowID DESC",
        LOAN_SELECT, where_clause
    );

    let loans = sqlx::query_as::<_, LoanRecord>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(loans)
}

/// Count total borrow records
pub async fn count_borrows(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Borrows")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Row counts of all three tables
pub async fn table_counts(pool: &SqlitePool) -> Result<TableCounts> {
    Ok(TableCounts {
        authors: count_authors(pool).await?,
        books: count_books(pool).await?,
        borrows: count_borrows(pool).await?,
    })
}
