//! EPUB package reading: container, package document, TOC and chapters.

mod archive;
mod chapter;
mod parser;
mod reader;
mod toc;

pub use archive::Package;
pub use chapter::match_title;
pub use parser::{Manifest, ManifestItem, OpfData, SpineRef, parse_container_xml, parse_opf};
pub use reader::{parse_book, parse_book_from_reader, parse_book_with};
pub use toc::extract_toc;
