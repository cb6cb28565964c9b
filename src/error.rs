//! Error types for folio operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a parse.
///
/// Per-chapter problems are not represented here: a chapter that cannot be
/// read or parsed is logged and skipped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Missing archive entry: {0}")]
    MissingEntry(String),

    #[error("Archive entry {name} is larger than the {limit} byte limit")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caused by the input not being a usable package, as
    /// opposed to a missing path or an environment failure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat(_)
                | Error::InvalidEpub(_)
                | Error::MissingEntry(_)
                | Error::EntryTooLarge { .. }
                | Error::Zip(_)
                | Error::Xml(_)
                | Error::Utf8(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
