use std::io::{Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::book::{BookDocument, BookFormat};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::util::{parent_dir, strip_bom};

use super::archive::Package;
use super::chapter::extract_chapters;
use super::parser::{parse_container_xml, parse_opf};
use super::toc::extract_toc;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Parse an EPUB (or KEPUB) file with default options.
///
/// # Example
///
/// ```no_run
/// let book = folio::parse_book("path/to/book.epub")?;
/// println!("{} by {}", book.metadata.title, book.metadata.author);
/// for chapter in &book.chapters {
///     println!("{:>3} {}", chapter.index, chapter.title.as_deref().unwrap_or("-"));
/// }
/// # Ok::<(), folio::Error>(())
/// ```
pub fn parse_book<P: AsRef<Path>>(path: P) -> Result<BookDocument> {
    parse_book_with(path, &ParseOptions::default())
}

/// Parse an EPUB (or KEPUB) file.
///
/// The extension is checked before the file is touched. Chapters that cannot
/// be read or parsed are skipped; everything else that goes wrong is an
/// error.
pub fn parse_book_with<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<BookDocument> {
    let path = path.as_ref();
    let format = format_of(path)?;

    debug!(path = %path.display(), %format, "Opening package");
    let package = Package::open(path, options)?;
    parse_package(package, format, path, options)
}

/// Parse a package from any [`Read`] + [`Seek`] source, e.g. an in-memory
/// buffer. `source` is only recorded in the result.
///
/// ```no_run
/// use std::io::Cursor;
/// use folio::{BookFormat, ParseOptions, parse_book_from_reader};
///
/// let data = std::fs::read("book.epub")?;
/// let book = parse_book_from_reader(
///     Cursor::new(data),
///     BookFormat::Epub,
///     "book.epub",
///     &ParseOptions::default(),
/// )?;
/// # Ok::<(), folio::Error>(())
/// ```
pub fn parse_book_from_reader<R: Read + Seek>(
    reader: R,
    format: BookFormat,
    source: impl AsRef<Path>,
    options: &ParseOptions,
) -> Result<BookDocument> {
    let package = Package::from_reader(reader, options)?;
    parse_package(package, format, source.as_ref(), options)
}

fn format_of(path: &Path) -> Result<BookFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    BookFormat::from_extension(ext).ok_or_else(|| {
        Error::UnsupportedFormat(if ext.is_empty() {
            path.display().to_string()
        } else {
            format!(".{ext}")
        })
    })
}

fn parse_package<R: Read + Seek>(
    mut package: Package<R>,
    format: BookFormat,
    source: &Path,
    options: &ParseOptions,
) -> Result<BookDocument> {
    let opf_path = locate_root_document(&mut package)?;
    package.set_base_dir(parent_dir(&opf_path));
    debug!(opf = %opf_path, base_dir = package.base_dir(), "Located package document");

    let opf_bytes = package.read(&opf_path)?;
    let opf_content = String::from_utf8(strip_bom(&opf_bytes).to_vec())?;
    let opf = parse_opf(&opf_content)?;
    debug!(
        manifest = opf.manifest.len(),
        spine = opf.spine.len(),
        "Parsed package document"
    );

    let toc = extract_toc(&mut package, &opf, options.toc_match);
    let chapters = extract_chapters(&mut package, &opf, &toc, options);
    package.close();

    Ok(BookDocument {
        metadata: opf.metadata,
        toc,
        chapters,
        format,
        source: source.to_path_buf(),
    })
}

/// Path of the root package document, from `META-INF/container.xml`.
fn locate_root_document<R: Read + Seek>(package: &mut Package<R>) -> Result<String> {
    let container = package.read(CONTAINER_PATH)?;
    parse_container_xml(&container)
}
