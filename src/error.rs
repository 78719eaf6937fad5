//! Error taxonomy.
//!
//! Everything here aborts the run: bad configuration, unreadable inputs,
//! and parse/semantic failures. Per-record problems (invalid characters,
//! missing UMIs, failed assembly, and so on) are not errors — they are
//! counted in [`crate::pipeline::log::ParseLog`] and the offending record
//! is dropped.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not open '{path}': {source}")]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("read count disagreement between '{fw}' ({fw_count} reads) and '{rv}' ({rv_count} reads)")]
    ReadCountMismatch {
        fw: PathBuf,
        rv: PathBuf,
        fw_count: usize,
        rv_count: usize,
    },

    #[error("could not parse '{path}' as a template database: {message}")]
    TemplateDatabaseParse { path: PathBuf, message: String },

    #[error("cannot trim {requested} amino acids from '{label}', a template of only {len} amino acids")]
    ExcessiveTrimming {
        requested: usize,
        label: String,
        len: usize,
    },

    #[error("'{0}' is not a valid reference sequence: only ACGTN and lowercase n are allowed")]
    InvalidReference(String),

    #[error("invalid split expression: {0}")]
    BadSplitExpression(#[from] regex::Error),

    #[error("{0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
