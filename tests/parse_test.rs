//! End-to-end parsing of generated packages.

mod common;

use common::{Fixture, ncx_doc, nav_doc, three_chapter_book, xhtml};
use folio::epub::match_title;
use folio::{
    BookFormat, Error, ParseOptions, TocEntry, TocMatch, parse_book, parse_book_from_reader,
    parse_book_with,
};
use tempfile::TempDir;

// ============================================================================
// Chapters
// ============================================================================

#[test]
fn test_chapters_follow_spine() {
    let (_dir, path) = three_chapter_book().write();
    let book = parse_book(&path).unwrap();

    let indices: Vec<_> = book.chapters.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let files: Vec<_> = book.chapters.iter().map(|c| c.file.as_str()).collect();
    assert_eq!(files, vec!["text/ch1.xhtml", "text/ch2.xhtml", "text/ch3.xhtml"]);

    let titles: Vec<_> = book.chapters.iter().map(|c| c.title.as_deref()).collect();
    assert_eq!(titles, vec![Some("One"), Some("Two"), Some("Three")]);

    assert_eq!(book.chapters[0].text, "One One Call me Ishmael.");
    assert!(book.chapters[1].raw_markup.contains("<p>The whale surfaced.</p>"));
    assert_eq!(book.format, BookFormat::Epub);
    assert_eq!(book.source, path);
}

#[test]
fn test_failed_chapter_leaves_index_gap() {
    let (_dir, path) = Fixture::new()
        .chapter("a", "a.xhtml", &xhtml("A", "<p>first</p>"))
        .dangling_item("b", "b.xhtml")
        .spine_ref("b")
        .chapter("c", "c.xhtml", &xhtml("C", "<p>third</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    let indices: Vec<_> = book.chapters.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 2]);
    assert!(book.get_chapter(1).is_none());
    assert_eq!(book.get_chapter(2).unwrap().file, "c.xhtml");
}

#[test]
fn test_unrecoverable_nesting_is_skipped() {
    let deep = format!("{}deep{}", "<div>".repeat(600), "</div>".repeat(600));
    let (_dir, path) = Fixture::new()
        .chapter("a", "a.xhtml", &xhtml("A", "<p>first</p>"))
        .chapter("b", "b.xhtml", &xhtml("B", &deep))
        .chapter("c", "c.xhtml", &xhtml("C", "<p>third</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    let indices: Vec<_> = book.chapters.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 2]);
}

#[test]
fn test_unknown_idref_is_skipped() {
    let (_dir, path) = Fixture::new()
        .spine_ref("ghost")
        .chapter("a", "a.xhtml", &xhtml("A", "<p>only</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(book.chapters.len(), 1);
    assert_eq!(book.chapters[0].index, 1);
}

#[test]
fn test_duplicate_spine_entries_are_kept() {
    let (_dir, path) = three_chapter_book().spine_ref("ch1").write();
    let book = parse_book(&path).unwrap();

    assert_eq!(book.chapters.len(), 4);
    assert_eq!(book.chapters[3].index, 3);
    assert_eq!(book.chapters[3].file, "text/ch1.xhtml");
    assert_eq!(book.chapters[3].text, book.chapters[0].text);
}

#[test]
fn test_structured_content() {
    let body = r#"
<table>
  <caption>Scores</caption>
  <tr><td>Ann</td><td>10</td></tr>
  <tr></tr>
</table>
<figure>
  <img src="../images/fig.png" alt="A figure"/>
  <figcaption>Figure 1</figcaption>
</figure>
<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50"><rect width="10" height="20"/></svg>
"#;
    let (_dir, path) = Fixture::new()
        .chapter("c", "text/c.xhtml", &xhtml("C", body))
        .write();

    let book = parse_book(&path).unwrap();
    let chapter = &book.chapters[0];

    assert_eq!(chapter.tables.len(), 1);
    assert_eq!(chapter.tables[0].rows.len(), 1);
    assert_eq!(chapter.tables[0].rows[0], vec!["Ann", "10"]);
    assert_eq!(chapter.tables[0].caption, "Scores");

    assert_eq!(chapter.images.len(), 1);
    assert_eq!(chapter.images[0].src, "../images/fig.png");
    assert_eq!(chapter.images[0].alt, "A figure");
    assert_eq!(chapter.images[0].title, "");
    assert_eq!(chapter.images[0].caption, "Figure 1");

    assert_eq!(chapter.charts.len(), 1);
    assert!(chapter.charts[0].starts_with("<svg"));
    assert!(chapter.charts[0].contains("<rect"));
}

#[test]
fn test_dot_segments_in_manifest_href() {
    let (_dir, path) = Fixture::new()
        .nav("nav.xhtml", &nav_doc(&[("One", "ch1.xhtml"), ("Two", "text/ch2.xhtml")]))
        .chapter_stored_as("ch1", "./ch1.xhtml", "OEBPS/ch1.xhtml", &xhtml("1", "<p>1</p>"))
        .chapter_stored_as(
            "ch2",
            "misc/../text/ch2.xhtml",
            "OEBPS/text/ch2.xhtml",
            &xhtml("2", "<p>2</p>"),
        )
        .write();

    let book = parse_book(&path).unwrap();
    let chapters: Vec<_> = book
        .chapters
        .iter()
        .map(|c| (c.file.as_str(), c.title.as_deref()))
        .collect();
    assert_eq!(
        chapters,
        vec![("ch1.xhtml", Some("One")), ("text/ch2.xhtml", Some("Two"))]
    );
}

#[test]
fn test_non_linear_spine_entry() {
    let fixture = three_chapter_book();
    let opf = fixture
        .opf()
        .replace(r#"<itemref idref="ch2"/>"#, r#"<itemref idref="ch2" linear="no"/>"#);
    let (_dir, path) = fixture.raw_opf(&opf).write();

    let book = parse_book(&path).unwrap();
    let linear: Vec<_> = book.chapters.iter().map(|c| c.linear).collect();
    assert_eq!(linear, vec![true, false, true]);
}

#[test]
fn test_book_size_budget() {
    let body = xhtml("Same", "<p>Same length</p>");
    let (_dir, path) = Fixture::new()
        .chapter("a", "a.xhtml", &body)
        .chapter("b", "b.xhtml", &body)
        .chapter("c", "c.xhtml", &body)
        .write();

    let options = ParseOptions::default().with_max_total_size(2 * body.len() as u64);
    let book = parse_book_with(&path, &options).unwrap();
    let indices: Vec<_> = book.chapters.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[test]
fn test_oversized_chapter_is_skipped() {
    let big = xhtml("Big", &"<p>filler text</p>".repeat(500));
    let (_dir, path) = Fixture::new()
        .chapter("a", "a.xhtml", &xhtml("A", "<p>small</p>"))
        .chapter("b", "b.xhtml", &big)
        .write();

    let options = ParseOptions::default().with_max_entry_size(4096);
    let book = parse_book_with(&path, &options).unwrap();
    let indices: Vec<_> = book.chapters.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![0]);
}

// ============================================================================
// Table of contents
// ============================================================================

#[test]
fn test_nav_wins_over_ncx() {
    let (_dir, path) = Fixture::new()
        .nav("nav.xhtml", &nav_doc(&[("Nav One", "a.xhtml")]))
        .ncx("toc.ncx", &ncx_doc(&[("Ncx One", "a.xhtml")]))
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(book.toc, vec![TocEntry::new("Nav One", "a.xhtml")]);
    assert_eq!(book.chapters[0].title.as_deref(), Some("Nav One"));
}

#[test]
fn test_ncx_fallback() {
    let (_dir, path) = Fixture::new()
        .ncx(
            "toc.ncx",
            &ncx_doc(&[("First", "text/a.xhtml"), ("Second", "text/b.xhtml#s2")]),
        )
        .chapter("a", "text/a.xhtml", &xhtml("A", "<p>a</p>"))
        .chapter("b", "text/b.xhtml", &xhtml("B", "<p>b</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(
        book.toc,
        vec![
            TocEntry::new("First", "text/a.xhtml"),
            TocEntry::new("Second", "text/b.xhtml#s2"),
        ]
    );
    assert_eq!(book.chapters[1].title.as_deref(), Some("Second"));
}

#[test]
fn test_nav_without_toc_entries_falls_back_to_ncx() {
    let empty_nav = xhtml("Nav", r#"<nav epub:type="landmarks"><a href="a.xhtml">Start</a></nav>"#);
    let (_dir, path) = Fixture::new()
        .nav("nav.xhtml", &empty_nav)
        .ncx("toc.ncx", &ncx_doc(&[("From NCX", "a.xhtml")]))
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(book.toc, vec![TocEntry::new("From NCX", "a.xhtml")]);
}

#[test]
fn test_unreadable_nav_falls_back_to_ncx() {
    let (_dir, path) = Fixture::new()
        .missing_nav("nav.xhtml")
        .ncx("toc.ncx", &ncx_doc(&[("From NCX", "a.xhtml")]))
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(book.toc, vec![TocEntry::new("From NCX", "a.xhtml")]);
    assert_eq!(book.chapters[0].title.as_deref(), Some("From NCX"));
}

#[test]
fn test_broken_ncx_gives_empty_toc() {
    let (_dir, path) = Fixture::new()
        .ncx(
            "toc.ncx",
            "<ncx><navMap><navPoint><navLabel><text>A</text></navLabel></navMap></ncx>",
        )
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert!(book.toc.is_empty());
    assert_eq!(book.chapters.len(), 1);
    assert_eq!(book.chapters[0].title, None);
}

#[test]
fn test_nav_in_subdirectory() {
    let nav = nav_doc(&[("One", "../text/ch1.xhtml"), ("Two", "../text/ch2.xhtml#top")]);
    let (_dir, path) = Fixture::new()
        .nav("nav/toc.xhtml", &nav)
        .chapter("ch1", "text/ch1.xhtml", &xhtml("1", "<p>1</p>"))
        .chapter("ch2", "text/ch2.xhtml", &xhtml("2", "<p>2</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(
        book.toc,
        vec![
            TocEntry::new("One", "text/ch1.xhtml"),
            TocEntry::new("Two", "text/ch2.xhtml#top"),
        ]
    );
    assert_eq!(book.chapters[1].title.as_deref(), Some("Two"));
}

#[test]
fn test_no_toc_is_not_an_error() {
    let (_dir, path) = Fixture::new()
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert!(book.toc.is_empty());
    assert_eq!(book.chapters[0].title, None);
}

#[test]
fn test_title_absent_versus_empty() {
    let (_dir, path) = Fixture::new()
        .nav("nav.xhtml", &nav_doc(&[("Listed", "listed.xhtml")]))
        .chapter("l", "listed.xhtml", &xhtml("L", "<p>l</p>"))
        .chapter("u", "unlisted.xhtml", &xhtml("U", "<p>u</p>"))
        .write();

    let book = parse_book(&path).unwrap();
    assert_eq!(book.chapters[0].title.as_deref(), Some("Listed"));
    assert_eq!(book.chapters[1].title, None);

    // Both extractors drop unlabeled entries, so an empty label only reaches
    // title matching through a hand-built list.
    let toc = vec![TocEntry::new("", "unlisted.xhtml")];
    assert_eq!(match_title(&toc, "unlisted.xhtml"), Some(String::new()));
    assert_eq!(match_title(&toc, "other.xhtml"), None);
}

#[test]
fn test_toc_match_modes() {
    let nav = xhtml("Nav", r#"<nav id="toc"><ol><li><a href="a.xhtml">Loose</a></li></ol></nav>"#);
    let (_dir, path) = Fixture::new()
        .nav("nav.xhtml", &nav)
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let strict = parse_book(&path).unwrap();
    assert!(strict.toc.is_empty());

    let options = ParseOptions::default().with_toc_match(TocMatch::AnyAttribute);
    let loose = parse_book_with(&path, &options).unwrap();
    assert_eq!(loose.toc, vec![TocEntry::new("Loose", "a.xhtml")]);
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_metadata_defaults() {
    let (_dir, path) = Fixture::new()
        .metadata("<dc:title>Only a Title</dc:title>")
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let meta = parse_book(&path).unwrap().metadata;
    assert_eq!(meta.title, "Only a Title");
    assert_eq!(meta.author, "Unknown");
    assert_eq!(meta.description, "");
    assert_eq!(meta.language, "");
    assert_eq!(meta.publisher, "");
    assert_eq!(meta.date, "");
    assert_eq!(meta.isbn, "");
    assert!(meta.tags.is_empty());
    assert_eq!(meta.series, "");
    assert_eq!(meta.series_index, "");
}

#[test]
fn test_metadata_full() {
    let (_dir, path) = Fixture::new()
        .metadata(
            r#"<dc:title>Moby Dick</dc:title>
<dc:creator>Herman Melville</dc:creator>
<dc:creator>A. Editor</dc:creator>
<dc:description>A &amp; B</dc:description>
<dc:date>1851-10-18T00:00:00Z</dc:date>
<dc:identifier id="uid">urn:uuid:1234</dc:identifier>
<dc:identifier id="ISBN-test">9780142437247</dc:identifier>
<dc:subject>Whales</dc:subject>
<dc:subject>Sea</dc:subject>
<meta name="calibre:series" content="Classics"/>
<meta name="calibre:series_index" content="3"/>"#,
        )
        .chapter("a", "a.xhtml", &xhtml("A", "<p>a</p>"))
        .write();

    let meta = parse_book(&path).unwrap().metadata;
    assert_eq!(meta.author, "Herman Melville & A. Editor");
    assert_eq!(meta.description, "A & B");
    assert_eq!(meta.date, "1851-10-18");
    assert_eq!(meta.isbn, "9780142437247");
    assert_eq!(meta.identifier, "urn:uuid:1234");
    assert_eq!(meta.tags, vec!["Whales", "Sea"]);
    assert_eq!(meta.series, "Classics");
    assert_eq!(meta.series_index, "3");
}

// ============================================================================
// Package-level errors
// ============================================================================

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = parse_book(dir.path().join("absent.epub")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(!err.is_format_error());
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = three_chapter_book().write_to(dir.path(), "book.zip");
    let err = parse_book(&path).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_not_a_zip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.epub");
    std::fs::write(&path, b"this is not a zip archive").unwrap();

    let err = parse_book(&path).unwrap_err();
    assert!(matches!(err, Error::Zip(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_missing_container() {
    let (_dir, path) = three_chapter_book().without_container().write();
    let err = parse_book(&path).unwrap_err();
    assert!(matches!(err, Error::MissingEntry(ref name) if name == "META-INF/container.xml"));
    assert!(err.is_format_error());
}

#[test]
fn test_container_without_rootfile() {
    let (_dir, path) = three_chapter_book()
        .without_container()
        .file(
            "META-INF/container.xml",
            br#"<container version="1.0"><rootfiles/></container>"#,
        )
        .write();

    let err = parse_book(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidEpub(_)));
}

#[test]
fn test_truncated_package_document() {
    let fixture = three_chapter_book();
    let opf = fixture.opf();
    let cut = &opf[..opf.find("</spine>").unwrap()];
    let (_dir, path) = fixture.raw_opf(cut).write();

    let err = parse_book(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidEpub(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_self_closing_xhtml_title() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title/></head>
<body><table><tr><td>a</td><td>b</td></tr></table><img src="x.png"/></body>
</html>"#;
    let (_dir, path) = Fixture::new().chapter("c", "c.xhtml", body).write();

    let chapter = &parse_book(&path).unwrap().chapters[0];
    assert_eq!(chapter.tables.len(), 1);
    assert_eq!(chapter.images.len(), 1);
    assert_eq!(chapter.text, "a b");
}

#[test]
fn test_oversized_package_document() {
    let fixture = three_chapter_book();
    let limit = common::CONTAINER_XML.len() as u64 + 16;
    assert!(fixture.opf().len() as u64 > limit);

    let (_dir, path) = fixture.write();
    let options = ParseOptions::default().with_max_entry_size(limit);
    let err = parse_book_with(&path, &options).unwrap_err();
    assert!(matches!(err, Error::EntryTooLarge { ref name, .. } if name == "OEBPS/content.opf"));
    assert!(err.is_format_error());
}

// ============================================================================
// Formats and sources
// ============================================================================

#[test]
fn test_kepub_extension() {
    let dir = TempDir::new().unwrap();
    let path = three_chapter_book().write_to(dir.path(), "Book.KEPUB");
    let book = parse_book(&path).unwrap();
    assert_eq!(book.format, BookFormat::Kepub);
    assert_eq!(book.chapters.len(), 3);
}

#[test]
fn test_parse_from_memory() {
    let fixture = three_chapter_book();
    let from_disk = {
        let (_dir, path) = fixture.write();
        let mut book = parse_book(&path).unwrap();
        book.source = "book.epub".into();
        book
    };

    let from_memory = parse_book_from_reader(
        std::io::Cursor::new(fixture.to_bytes()),
        BookFormat::Epub,
        "book.epub",
        &ParseOptions::default(),
    )
    .unwrap();
    assert_eq!(from_memory, from_disk);
}

#[test]
fn test_parse_is_idempotent() {
    let (_dir, path) = three_chapter_book().write();
    let first = parse_book(&path).unwrap();
    let second = parse_book(&path).unwrap();
    assert_eq!(first, second);
}
