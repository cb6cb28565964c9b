//! # folio
//!
//! A structural parser for EPUB ebooks.
//!
//! A package is opened, its root document located through
//! `META-INF/container.xml`, and the result turned into a [`BookDocument`]:
//! metadata, a flat table of contents, and one [`Chapter`] per spine entry
//! with its plain text, tables, images and embedded SVG.
//!
//! ## Quick Start
//!
//! ```no_run
//! let book = folio::parse_book("input.epub")?;
//!
//! println!("{} ({} chapters)", book.metadata.title, book.chapters.len());
//! for hit in book.search("whale") {
//!     println!("chapter {}: ...{}...", hit.chapter_index, hit.snippet);
//! }
//!
//! // Export without the original markup
//! let json = book.to_json(false, true)?;
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! ## Malformed input
//!
//! Package-level problems (not a ZIP, no container, broken package document)
//! are errors. Chapter-level problems are not: an unreadable spine document is
//! logged through [`tracing`] and skipped, and the remaining chapters keep
//! their spine index.
//!
//! ```no_run
//! use folio::{ParseOptions, TocMatch, parse_book_with};
//!
//! let options = ParseOptions::default()
//!     .with_max_entry_size(16 * 1024 * 1024)
//!     .with_toc_match(TocMatch::AnyAttribute);
//! let book = parse_book_with("input.kepub", &options)?;
//! # Ok::<(), folio::Error>(())
//! ```

pub mod book;
pub mod dom;
pub mod epub;
pub mod error;
pub mod options;
pub(crate) mod util;

pub use book::{
    BookDocument, BookFormat, Chapter, ImageContent, Metadata, SearchHit, TableContent, TocEntry,
};
pub use epub::{Package, parse_book, parse_book_from_reader, parse_book_with};
pub use error::{Error, Result};
pub use options::{ParseOptions, TocMatch};
