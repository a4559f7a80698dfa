//! Integration tests for database setup against real files
//!
//! Every test works on its own temporary directory, so the files created by
//! the setup script and the connection pragmas are exercised end to end.

use chrono::NaiveDate;
use library_core::storage::seed::SAMPLE_OPEN_LOAN_BOOKS;
use library_core::storage::{
    queries, Database, LoanFilter, NewAuthor, NewBook, NewBorrow, TableCounts,
};
use library_core::{LibraryConfig, LibraryError};
use std::path::PathBuf;
use tempfile::TempDir;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("libraryDB.sqlite")
}

async fn setup(dir: &TempDir) -> Database {
    let path = db_path(dir);
    let config = LibraryConfig::default().with_database_path(&path);
    Database::create(&path, &config)
        .await
        .expect("Failed to create database")
}

#[tokio::test]
async fn test_setup_populates_sample_data() {
    let dir = TempDir::new().unwrap();
    let db = setup(&dir).await;

    let counts = db.verify_structure().await.expect("Failed to verify");
    assert_eq!(
        counts,
        TableCounts {
            authors: 5,
            books: 8,
            borrows: 5
        }
    );

    let books = queries::list_books(db.pool()).await.unwrap();
    for book in &books {
        let author_id = book.author_id.expect("sample books all have an author");
        assert!((1..=5).contains(&author_id), "book {} has author {}", book.book_id, author_id);
    }

    let mut open_books: Vec<i64> = queries::list_loans(db.pool(), LoanFilter::Outstanding)
        .await
        .unwrap()
        .into_iter()
        .map(|loan| loan.book_id)
        .collect();
    open_books.sort_unstable();
    let mut expected = SAMPLE_OPEN_LOAN_BOOKS.to_vec();
    expected.sort_unstable();
    assert_eq!(open_books, expected);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_setup_is_idempotent() {
    let dir = TempDir::new().unwrap();
    setup(&dir).await.close().await.unwrap();

    let db = setup(&dir).await;
    let counts = db.verify_structure().await.unwrap();
    assert_eq!((counts.authors, counts.books, counts.borrows), (5, 8, 5));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_fresh_setups_are_identical() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = setup(&first_dir).await;
    let second = setup(&second_dir).await;

    assert_eq!(
        queries::list_authors(first.pool()).await.unwrap(),
        queries::list_authors(second.pool()).await.unwrap()
    );
    assert_eq!(
        queries::list_books_with_authors(first.pool()).await.unwrap(),
        queries::list_books_with_authors(second.pool()).await.unwrap()
    );
    assert_eq!(
        queries::list_loans(first.pool(), LoanFilter::All).await.unwrap(),
        queries::list_loans(second.pool(), LoanFilter::All).await.unwrap()
    );
}

#[tokio::test]
async fn test_delete_book_removes_only_its_borrows() {
    let dir = TempDir::new().unwrap();
    let db = setup(&dir).await;

    assert_eq!(queries::delete_book(db.pool(), 1).await.unwrap(), 1);

    let remaining: Vec<i64> = queries::list_loans(db.pool(), LoanFilter::All)
        .await
        .unwrap()
        .into_iter()
        .map(|loan| loan.borrow_id)
        .collect();
    assert_eq!(remaining, vec![5, 4, 3, 2]);
    assert!(queries::find_borrow_by_id(db.pool(), 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_author_rejected_when_enforced() {
    let dir = TempDir::new().unwrap();
    let db = setup(&dir).await;

    let orphan = NewBook::new("Orphan".to_string()).with_author(99);
    let result = queries::insert_book(db.pool(), &orphan).await;
    assert!(matches!(result, Err(LibraryError::ForeignKeyViolation(_))));
    assert_eq!(queries::count_books(db.pool()).await.unwrap(), 8);

    let borrow = NewBorrow::new(42, "Frank Miller".to_string(), date("2024-04-01"));
    let result = queries::insert_borrow(db.pool(), &borrow).await;
    assert!(matches!(result, Err(LibraryError::ForeignKeyViolation(_))));
    assert_eq!(queries::count_borrows(db.pool()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_enforcement_off_allows_dangling_references() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    setup(&dir).await.close().await.unwrap();

    let config = LibraryConfig {
        enforce_foreign_keys: false,
        ..LibraryConfig::default()
    };
    let db = Database::open(&path, &config).await.expect("Failed to open");

    queries::insert_book(db.pool(), &NewBook::new("Orphan".to_string()).with_author(99))
        .await
        .expect("insert should succeed without enforcement");
    let borrow = NewBorrow::new(42, "Frank Miller".to_string(), date("2024-04-01"));
    queries::insert_borrow(db.pool(), &borrow)
        .await
        .expect("borrow of unknown book should succeed without enforcement");

    // The cascade rule is declared but does not fire
    queries::delete_book(db.pool(), 1).await.unwrap();
    assert_eq!(queries::count_borrows(db.pool()).await.unwrap(), 6);

    let issues = db.foreign_key_check().await.unwrap();
    assert_eq!(issues.len(), 3);
    assert!(issues.iter().any(|i| i.table_name == "Books" && i.parent_table == "Authors"));
    assert!(issues.iter().any(|i| i.table_name == "Borrows" && i.parent_table == "Books"));
}

#[tokio::test]
async fn test_open_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    let err = Database::open(&path, &LibraryConfig::default()).await.unwrap_err();
    assert!(matches!(err, LibraryError::FileNotFound(_)));
    assert!(err.needs_setup());
    assert!(!path.exists(), "open must not create the file");
}

#[tokio::test]
async fn test_open_uninitialized_file() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    std::fs::File::create(&path).unwrap();

    let err = Database::open(&path, &LibraryConfig::default()).await.unwrap_err();
    match err {
        LibraryError::SchemaMismatch { missing } => {
            assert_eq!(missing, vec!["Authors", "Books", "Borrows"]);
        }
        other => panic!("expected schema mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_without_seed_then_seed() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let config = LibraryConfig {
        seed_sample_data: false,
        ..LibraryConfig::default()
    };

    let db = Database::create(&path, &config).await.unwrap();
    assert_eq!(db.verify_structure().await.unwrap(), TableCounts::default());

    assert!(db.seed_sample_data().await.unwrap());
    assert!(!db.seed_sample_data().await.unwrap());
    assert_eq!(queries::count_authors(db.pool()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_write_check_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let db = setup(&dir).await;

    db.check_write_access().await.expect("write check failed");
    assert_eq!(queries::count_authors(db.pool()).await.unwrap(), 5);

    let next = queries::insert_author(db.pool(), &NewAuthor::new("Ursula K. Le Guin".to_string()))
        .await
        .unwrap();
    assert_eq!(next, 6);
}

#[tokio::test]
async fn test_export_copy_opens() {
    let dir = TempDir::new().unwrap();
    let db = setup(&dir).await;
    let backup = dir.path().join("backup.sqlite");

    db.export(&backup).await.expect("Failed to export");
    db.close().await.unwrap();

    let copy = Database::open(&backup, &LibraryConfig::default()).await.unwrap();
    let counts = copy.verify_structure().await.unwrap();
    assert_eq!((counts.authors, counts.books, counts.borrows), (5, 8, 5));
    assert!(copy.check_integrity().await.unwrap());
}

#[tokio::test]
async fn test_init_after_unseeded_setup_keeps_user_rows() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let unseeded = LibraryConfig {
        seed_sample_data: false,
        ..LibraryConfig::default()
    };

    let db = Database::create(&path, &unseeded).await.unwrap();
    let author_id = queries::insert_author(db.pool(), &NewAuthor::new("Frank Herbert".to_string()))
        .await
        .unwrap();
    let dune = NewBook::new("Dune".to_string()).with_author(author_id);
    let book_id = queries::insert_book(db.pool(), &dune).await.unwrap();
    queries::borrow_book(db.pool(), book_id, "Paul Atreides", date("2024-05-01"))
        .await
        .unwrap();
    db.close().await.unwrap();

    // A second setup run with seeding on must not mix sample rows in
    let db = setup(&dir).await;
    let counts = db.verify_structure().await.unwrap();
    assert_eq!((counts.authors, counts.books, counts.borrows), (1, 1, 1));

    let loans = queries::list_loans(db.pool(), LoanFilter::All).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].title, "Dune");
    assert_eq!(loans[0].borrower_name, "Paul Atreides");

    assert!(matches!(
        db.seed_sample_data().await,
        Err(LibraryError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_setup_over_untracked_database() {
    let dir = TempDir::new().unwrap();
    let first = setup(&dir).await;
    queries::delete_book(first.pool(), 8).await.unwrap();

    // Same tables and rows, but no record of which setup steps ran
    sqlx::query("DROP TABLE _migrations").execute(first.pool()).await.unwrap();
    first.close().await.unwrap();

    let db = setup(&dir).await;
    let counts = db.verify_structure().await.unwrap();
    assert_eq!((counts.authors, counts.books, counts.borrows), (5, 7, 5));

    let alice = queries::find_loan_by_id(db.pool(), 1).await.unwrap().unwrap();
    assert_eq!(alice.title, "Harry Potter and the Philosopher's Stone");
}
