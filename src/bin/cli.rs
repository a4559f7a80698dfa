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


use anyhow::Context;
use chrono::{Datelike, Local, NaiveDate};
use clap::{ArgAction, Parser, Subcommand};
use library_core::storage::{
    queries, Author, BookWithAuthor, Database, DatabaseStats, ForeignKeyIssue, LoanFilter,
    LoanRecord, NewAuthor, NewBook, TableCounts,
};
use library_core::{LibraryConfig, LibraryError};
use serde::Serialize;
use serde_json::json;
use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "library-cli")]
#[command(version, about = "Library CLI - authors, books and borrow records", long_about = None)]
struct Cli {
    /// SQLite database file (overrides config file and LIBRARY_DB)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run the setup script
    Init {
        /// Create the tables without the sample authors, books and borrows
        #[arg(long)]
        no_seed: bool,
    },
    /// Verify tables, row counts, write access and integrity
    Check,
    /// Manage books
    #[command(subcommand)]
    Books(BookCommands),
    /// Manage authors
    #[command(subcommand)]
    Authors(AuthorCommands),
    /// Lend a book to someone
    Borrow {
        /// Book ID
        book_id: i64,
        /// Borrower's name
        borrower: String,
        /// Loan date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record a book coming back
    Return {
        /// Borrow ID of the open loan
        borrow_id: i64,
        /// Return date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show loans (outstanding only unless --all)
    Loans {
        /// Include returned books
        #[arg(long)]
        all: bool,
    },
    /// Reclaim unused space in the database file
    Vacuum,
    /// Copy the database to another file
    Backup {
        /// Destination file
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum BookCommands {
    /// List all books with their authors
    List,
    /// Find books by title
    Search { query: String },
    /// Add a book
    Add {
        title: String,
        /// Publication year
        #[arg(long)]
        year: Option<i32>,
        /// Author ID
        #[arg(long)]
        author: Option<i64>,
    },
    /// Change a book's title
    Rename { book_id: i64, title: String },
    /// Delete a book and its borrow records
    Delete {
        book_id: i64,
        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AuthorCommands {
    /// List all authors
    List,
    /// Add an author
    Add {
        name: String,
        /// Birth year
        #[arg(long)]
        birth_year: Option<i32>,
    },
    /// Change an author's name and/or birth year
    Update {
        author_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        birth_year: Option<i32>,
    },
    /// Delete an author (their books are kept without author)
    Delete {
        author_id: i64,
        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut out = Output::new(cli.json, std::io::stdout());
    if let Err(e) = run(cli, &mut out).await {
        match e.downcast_ref::<LibraryError>() {
            Some(err) => eprintln!("Error: {}", err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("library_core={level},library_cli={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run<W: Write>(cli: Cli, out: &mut Output<W>) -> anyhow::Result<()> {
    let mut config = LibraryConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.database {
        config = config.with_database_path(path);
    }

    if let Commands::Init { no_seed } = cli.command {
        config.seed_sample_data = !no_seed;
        let db = Database::create(&config.database_path, &config).await?;
        let counts = db.verify_structure().await?;
        let text = format!(
            "Database ready: {}\n{}",
            config.database_path.display(),
            count_lines(&counts)
        );
        out.report(&counts, text)?;
        return db.close().await.map_err(Into::into);
    }

    let db = Database::open(&config.database_path, &config).await?;
    let result = match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Check => check(&db, out).await,
        Commands::Books(cmd) => books(&db, out, cmd).await,
        Commands::Authors(cmd) => authors(&db, out, cmd).await,
        Commands::Borrow {
            book_id,
            borrower,
            date,
        } => {
            let borrower = required_text("Borrower name", &borrower)?;
            let date = date.unwrap_or_else(today);
            let borrow_id = queries::borrow_book(db.pool(), book_id, &borrower, date).await?;
            let loan = queries::find_loan_by_id(db.pool(), borrow_id)
                .await?
                .context("new borrow record could not be read back")?;
            let text = format!(
                "Success! Book '{}' borrowed by {} (borrow ID {}).",
                loan.title, loan.borrower_name, loan.borrow_id
            );
            out.report(&loan, text)
        }
        Commands::Return { borrow_id, date } => {
            let date = date.unwrap_or_else(today);
            let loan = queries::return_book(db.pool(), borrow_id, date).await?;
            let text = format!("Success! '{}' returned by {}.", loan.title, loan.borrower_name);
            out.report(&loan, text)
        }
        Commands::Loans { all } => {
            let filter = if all { LoanFilter::All } else { LoanFilter::Outstanding };
            let loans = queries::list_loans(db.pool(), filter).await?;
            out.loans(&loans, filter)
        }
        Commands::Vacuum => {
            let before = db.get_stats().await?;
            db.checkpoint().await?;
            db.vacuum().await?;
            let after = db.get_stats().await?;
            let text = format!(
                "Reclaimed {} bytes ({} -> {} bytes).",
                before.total_size.saturating_sub(after.total_size),
                before.total_size,
                after.total_size
            );
            out.report(&json!({ "before": before, "after": after }), text)
        }
        Commands::Backup { path } => {
            db.export(&path).await?;
            let destination = path.display().to_string();
            let text = format!("Database copied to {}", destination);
            out.report(&json!({ "backup": destination }), text)
        }
    };

    db.close().await?;
    result
}

/// Everything `check` found out about the database
#[derive(Debug, Serialize)]
struct CheckReport {
    counts: TableCounts,
    writable: bool,
    integrity_ok: bool,
    dangling_references: Vec<ForeignKeyIssue>,
    stats: DatabaseStats,
}

impl CheckReport {
    fn ensure_healthy(&self) -> anyhow::Result<()> {
        if !self.integrity_ok {
            anyhow::bail!("integrity check failed");
        }
        Ok(())
    }

    fn text(&self) -> String {
        let mut lines = vec![
            "Database structure verified successfully.".to_string(),
            count_lines(&self.counts),
            "Database write/read test successful.".to_string(),
            format!("Integrity check: {}", if self.integrity_ok { "ok" } else { "FAILED" }),
        ];

        if self.dangling_references.is_empty() {
            lines.push("Foreign keys: ok".to_string());
        } else {
            lines.push(format!(
                "Foreign keys: {} dangling reference(s)",
                self.dangling_references.len()
            ));
            for issue in &self.dangling_references {
                let row = or_unknown(issue.row_id, "?");
                lines.push(format!(
                    "  {} row {} -> missing {}",
                    issue.table_name, row, issue.parent_table
                ));
            }
        }

        lines.push(format!(
            "Size: {} bytes, {:.1}% unused ({} free pages)",
            self.stats.total_size,
            self.stats.unused_percentage(),
            self.stats.freelist_count
        ));
        lines.join("\n")
    }
}

async fn check<W: Write>(db: &Database, out: &mut Output<W>) -> anyhow::Result<()> {
    let counts = db.verify_structure().await?;
    db.check_write_access().await?;

    let report = CheckReport {
        counts,
        writable: true,
        integrity_ok: db.check_integrity().await?,
        dangling_references: db.foreign_key_check().await?,
        stats: db.get_stats().await?,
    };

    out.report(&report, report.text())?;
    report.ensure_healthy()
}

async fn books<W: Write>(
    db: &Database,
    out: &mut Output<W>,
    cmd: BookCommands,
) -> anyhow::Result<()> {
    let pool = db.pool();
    match cmd {
        BookCommands::List => {
            let books = queries::list_books_with_authors(pool).await?;
            out.books(&books)
        }
        BookCommands::Search { query } => {
            let books = queries::search_books_by_title(pool, query.trim()).await?;
            out.books(&books)
        }
        BookCommands::Add {
            title,
            year,
            author,
        } => {
            let title = required_text("Book title", &title)?;
            if let Some(year) = year {
                check_year("publication year", year, today().year() + 10)?;
            }
            if let Some(author_id) = author {
                if queries::find_author_by_id(pool, author_id).await?.is_none() {
                    return Err(LibraryError::not_found(format!("author {}", author_id)).into());
                }
            }

            let book = NewBook {
                title,
                publication_year: year,
                author_id: author,
            };
            let book_id = queries::insert_book(pool, &book).await?;
            let text = format!("Success! Book '{}' was added with ID: {}", book.title, book_id);
            out.report(&json!({ "book_id": book_id, "title": book.title }), text)
        }
        BookCommands::Rename { book_id, title } => {
            let title = required_text("Title", &title)?;
            queries::update_book_title(pool, book_id, &title).await?;
            out.report(
                &json!({ "book_id": book_id, "title": title }),
                "Book title updated successfully.",
            )
        }
        BookCommands::Delete { book_id, yes } => {
            let book = queries::find_book_by_id(pool, book_id)
                .await?
                .ok_or_else(|| LibraryError::not_found(format!("book {}", book_id)))?;
            let borrows = queries::list_borrows_for_book(pool, book_id).await?.len();

            if !yes {
                let text = format!(
                    "Deleting '{}' will also delete {} borrow record(s). \
                     Re-run with --yes to confirm.",
                    book.title, borrows
                );
                let value = json!({
                    "book_id": book_id,
                    "title": book.title,
                    "deleted": false,
                    "borrows": borrows,
                });
                return out.report(&value, text);
            }

            queries::delete_book(pool, book_id).await?;
            let text = format!(
                "Book '{}' deleted ({} borrow record(s) removed).",
                book.title, borrows
            );
            let value = json!({
                "book_id": book_id,
                "title": book.title,
                "deleted": true,
                "borrows": borrows,
            });
            out.report(&value, text)
        }
    }
}

async fn authors<W: Write>(
    db: &Database,
    out: &mut Output<W>,
    cmd: AuthorCommands,
) -> anyhow::Result<()> {
    let pool = db.pool();
    match cmd {
        AuthorCommands::List => {
            let authors = queries::list_authors(pool).await?;
            out.authors(&authors)
        }
        AuthorCommands::Add { name, birth_year } => {
            let name = required_text("Author name", &name)?;
            if let Some(year) = birth_year {
                check_year("birth year", year, today().year())?;
            }
            let author = NewAuthor { name, birth_year };
            let author_id = queries::insert_author(pool, &author).await?;
            let text = format!(
                "Success! Author '{}' was added with ID: {}",
                author.name, author_id
            );
            out.report(&json!({ "author_id": author_id, "name": author.name }), text)
        }
        AuthorCommands::Update {
            author_id,
            name,
            birth_year,
        } => {
            let mut author = queries::find_author_by_id(pool, author_id)
                .await?
                .ok_or_else(|| LibraryError::not_found(format!("author {}", author_id)))?;
            if let Some(name) = name {
                author.name = required_text("Author name", &name)?;
            }
            if let Some(year) = birth_year {
                check_year("birth year", year, today().year())?;
                author.birth_year = Some(year);
            }
            queries::update_author(pool, &author).await?;
            out.report(&author, "Author information updated successfully.")
        }
        AuthorCommands::Delete { author_id, yes } => {
            let author = queries::find_author_by_id(pool, author_id)
                .await?
                .ok_or_else(|| LibraryError::not_found(format!("author {}", author_id)))?;
            let book_count = queries::count_books_by_author(pool, author_id).await?;

            if !yes {
                let warning = if book_count > 0 {
                    format!(" This will affect {} book(s).", book_count)
                } else {
                    String::new()
                };
                let text = format!(
                    "Deleting '{}'.{} Re-run with --yes to confirm.",
                    author.name, warning
                );
                let value = json!({
                    "author_id": author_id,
                    "name": author.name,
                    "deleted": false,
                    "books_affected": book_count,
                });
                return out.report(&value, text);
            }

            queries::delete_author(pool, author_id).await?;
            let value = json!({
                "author_id": author_id,
                "name": author.name,
                "deleted": true,
                "books_affected": book_count,
            });
            out.report(&value, format!("Author '{}' deleted.", author.name))
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn count_lines(counts: &TableCounts) -> String {
    format!(
        "  Authors: {} records\n  Books: {} records\n  Borrows: {} records",
        counts.authors, counts.books, counts.borrows
    )
}

fn required_text(label: &str, value: &str) -> Result<String, LibraryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::invalid_input(format!("{} cannot be empty", label)));
    }
    Ok(trimmed.to_string())
}

fn check_year(label: &str, year: i32, max: i32) -> Result<(), LibraryError> {
    if !(0..=max).contains(&year) {
        return Err(LibraryError::invalid_input(format!(
            "please enter a reasonable {} (0-{})",
            label, max
        )));
    }
    Ok(())
}

/// Shorten to `width` characters, marking the cut with "..."
fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let kept: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        value.to_string()
    }
}

fn or_unknown<T: ToString>(value: Option<T>, fallback: &str) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| fallback.to_string())
}

/// Where command results go: a table/prose for people, JSON with `--json`
struct Output<W: Write> {
    json: bool,
    writer: W,
}

impl<W: Write> Output<W> {
    fn new(json: bool, writer: W) -> Self {
        Self { json, writer }
    }

    fn print_json<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<()> {
        writeln!(self.writer, "{}", serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    /// Emit `value` as JSON or `text` as-is, depending on the mode
    fn report<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        text: impl Display,
    ) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(value);
        }
        writeln!(self.writer, "{}", text)?;
        Ok(())
    }

    fn books(&mut self, books: &[BookWithAuthor]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(books);
        }
        if books.is_empty() {
            writeln!(self.writer, "No books found in the library.")?;
            return Ok(());
        }

        writeln!(self.writer, "{:<4} {:<30} {:<6} {:<20}", "ID", "Title", "Year", "Author")?;
        writeln!(self.writer, "{}", "-".repeat(65))?;
        for book in books {
            writeln!(
                self.writer,
                "{:<4} {:<30} {:<6} {:<20}",
                book.book_id,
                truncate(&book.title, 30),
                or_unknown(book.publication_year, "Unknown"),
                or_unknown(book.author_name.as_deref(), "Unknown Author"),
            )?;
        }
        writeln!(self.writer, "\nTotal books: {}", books.len())?;
        Ok(())
    }

    fn authors(&mut self, authors: &[Author]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(authors);
        }
        if authors.is_empty() {
            writeln!(self.writer, "No authors found.")?;
            return Ok(());
        }

        writeln!(self.writer, "{:<4} {:<30} {:<10}", "ID", "Name", "Birth Year")?;
        writeln!(self.writer, "{}", "-".repeat(45))?;
        for author in authors {
            writeln!(
                self.writer,
                "{:<4} {:<30} {:<10}",
                author.author_id,
                truncate(&author.name, 30),
                or_unknown(author.birth_year, "Unknown"),
            )?;
        }
        writeln!(self.writer, "\nTotal authors: {}", authors.len())?;
        Ok(())
    }

    fn loans(&mut self, loans: &[LoanRecord], filter: LoanFilter) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(loans);
        }
        if loans.is_empty() {
            let text = match filter {
                LoanFilter::Outstanding => "No books are currently borrowed.",
                LoanFilter::All => "No borrow records found.",
            };
            writeln!(self.writer, "{}", text)?;
            return Ok(());
        }

        writeln!(
            self.writer,
            "{:<4} {:<25} {:<20} {:<12} {:<12}",
            "ID", "Title", "Borrower", "Borrowed", "Returned"
        )?;
        writeln!(self.writer, "{}", "-".repeat(75))?;
        for loan in loans {
            writeln!(
                self.writer,
                "{:<4} {:<25} {:<20} {:<12} {:<12}",
                loan.borrow_id,
                truncate(&loan.title, 25),
                truncate(&loan.borrower_name, 20),
                loan.date_borrowed.to_string(),
                or_unknown(loan.return_date, "Not Returned"),
            )?;
        }
        writeln!(self.writer, "\nTotal records: {}", loans.len())?;
        Ok(())
    }
}
