//! Error types for loading the input tables.
use std::path::PathBuf;
use thiserror::Error;

/// Fatal load failures. Any of these aborts the run before output is written.
#[derive(Error, Debug)]
pub enum LoadError {
    /// File missing or unreadable
    #[error("could not read data file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed delimited text
    #[error("could not parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Required columns absent from the header row
    #[error("{path} is missing required column(s): {}", missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    /// Date cell in neither accepted format
    #[error("{path}, line {line}: unparseable date {value:?} (expected YYYY-MM-DD or DD,MM,YYYY)")]
    BadDate {
        path: PathBuf,
        line: u64,
        value: String,
    },

    /// Quarter cell with no digits to sort by
    #[error("{path}, line {line}: unparseable quarter {value:?}")]
    BadQuarter {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

/// Type alias for loader results
pub type Result<T> = std::result::Result<T, LoadError>;
