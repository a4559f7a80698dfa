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


//! Runtime configuration
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! the `LIBRARY_DB` environment variable (the CLI's `--database` flag is
//! applied last by the binary itself).

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database file name, resolved against the working directory
pub const DEFAULT_DATABASE_FILE: &str = "libraryDB.sqlite";

/// Environment variable overriding the database location
pub const DATABASE_ENV_VAR: &str = "LIBRARY_DB";

/// Library database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Location of the SQLite database file
    pub database_path: PathBuf,
    /// Turn on `PRAGMA foreign_keys` for every pooled connection
    pub enforce_foreign_keys: bool,
    /// How long a statement waits on a locked database
    pub busy_timeout_secs: u64,
    /// Upper bound on pooled connections for file databases
    pub max_connections: u32,
    /// Load the sample authors/books/borrows when creating a database
    pub seed_sample_data: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            enforce_foreign_keys: true,
            busy_timeout_secs: 30,
            max_connections: 5,
            seed_sample_data: true,
        }
    }
}

impl LibraryConfig {
    /// Load configuration from an optional JSON file plus the environment
    ///
    /// Missing keys in the file fall back to their defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LibraryError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LibraryError::ConfigurationError(format!("Invalid config JSON: {}", e)))?;
        Ok(config)
    }

    /// Replace the database location
    pub fn with_database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = path.into();
        self
    }

    /// Reject values that can never produce a working pool
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(LibraryError::ConfigurationError(
                "database_path must not be empty".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(LibraryError::ConfigurationError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}
