//! Error type shared by the filtering stages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from the database, the workspace, or the external tools.
#[derive(Debug, Error)]
pub enum Error {
    /// A database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Reading or writing a file failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line in a tool output file could not be parsed.
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    /// The external program could not be started.
    #[error("cannot run {program}: {message}")]
    ToolMissing {
        program: String,
        message: String,
    },

    /// The external program exited with a failure status.
    #[error("command failed with {}: {command}", status.map_or(String::from("a signal"), |code| format!("exit code {}", code)))]
    ToolFailed {
        command: String,
        status: Option<i32>,
    },

    /// Invalid parameters.
    #[error("{0}")]
    Config(String),

    /// The database does not look like a pipeline database.
    #[error("{0}")]
    Schema(String),
}

impl Error {
    /// Wraps an I/O error with the path it concerns.
    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn parse(file: &str, line: usize, message: String) -> Self {
        Error::Parse { file: file.to_string(), line, message }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
