//! SQLite-backed library catalogue
//!
//! Three tables back the application: Authors, Books and Borrows. A book may
//! name one author; a borrow always names one book and is an open loan until
//! its return date is set. Deleting a book removes its borrow history.

pub mod config;
pub mod error;
pub mod storage;

pub use config::LibraryConfig;
pub use error::{LibraryError, Result};
pub use storage::Database;
