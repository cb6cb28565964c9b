//! The extracted book: metadata, flat table of contents, and chapters.
//!
//! Everything here is a plain value. A [`BookDocument`] is produced once per
//! parse; lookups and search run over it without touching the package again.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Package flavour, decided by the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Epub,
    /// Kobo's EPUB variant; read exactly like EPUB.
    Kepub,
}

impl BookFormat {
    /// Recognize a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "epub" => Some(BookFormat::Epub),
            "kepub" => Some(BookFormat::Kepub),
            _ => None,
        }
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookFormat::Epub => f.write_str("epub"),
            BookFormat::Kepub => f.write_str("kepub"),
        }
    }
}

/// Book metadata (Dublin Core plus calibre extensions).
///
/// `title` and `author` fall back to [`Metadata::UNKNOWN`]; every other string
/// field falls back to `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: String,
    /// All creators joined with `" & "`.
    pub author: String,
    pub description: String,
    pub language: String,
    pub publisher: String,
    /// `YYYY-MM-DD` when the source date was longer.
    pub date: String,
    pub isbn: String,
    /// First identifier of any scheme.
    pub identifier: String,
    /// Subjects in document order.
    pub tags: Vec<String>,
    pub series: String,
    pub series_index: String,
    /// Manifest href of the cover image.
    pub cover_image: String,
}

impl Metadata {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: Self::UNKNOWN.to_string(),
            author: Self::UNKNOWN.to_string(),
            description: String::new(),
            language: String::new(),
            publisher: String::new(),
            date: String::new(),
            isbn: String::new(),
            identifier: String::new(),
            tags: Vec::new(),
            series: String::new(),
            series_index: String::new(),
            cover_image: String::new(),
        }
    }
}

/// A table of contents entry. The list is flat and in navigation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub title: String,
    /// Path relative to the package directory, possibly with `#fragment`.
    pub href: String,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

/// A table found in a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableContent {
    /// The table re-serialized from the parsed tree.
    pub markup: String,
    /// Cell texts per row; rows without cells are omitted.
    pub rows: Vec<Vec<String>>,
    pub caption: String,
}

/// An image referenced by a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageContent {
    /// The `src` attribute as written; not checked against the package.
    pub src: String,
    pub alt: String,
    pub title: String,
    /// Caption of the nearest enclosing `<figure>`.
    pub caption: String,
}

/// One spine entry's extracted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    /// Position in the spine. Skipped entries leave gaps; indices are never
    /// renumbered.
    pub index: usize,
    /// Manifest href of the backing document.
    pub file: String,
    /// `None` when no TOC entry points at this file.
    pub title: Option<String>,
    /// False for spine entries marked `linear="no"` (auxiliary content).
    pub linear: bool,
    pub raw_markup: String,
    pub text: String,
    pub tables: Vec<TableContent>,
    pub images: Vec<ImageContent>,
    /// Embedded SVG elements, re-serialized.
    pub charts: Vec<String>,
}

impl Chapter {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// A search match inside a chapter's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub chapter_index: usize,
    pub chapter_title: Option<String>,
    /// Byte offset of the match in the chapter text.
    pub offset: usize,
    /// The match with some surrounding context.
    pub snippet: String,
}

/// The result of parsing one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookDocument {
    pub metadata: Metadata,
    pub toc: Vec<TocEntry>,
    pub chapters: Vec<Chapter>,
    pub format: BookFormat,
    pub source: PathBuf,
}

/// Characters of context kept on each side of a search match.
const SNIPPET_CONTEXT: usize = 60;

impl BookDocument {
    /// Chapter by spine index (not by position in `chapters`).
    pub fn get_chapter(&self, index: usize) -> Option<&Chapter> {
        self.chapters
            .binary_search_by_key(&index, |c| c.index)
            .ok()
            .map(|pos| &self.chapters[pos])
    }

    /// Case-insensitive substring search over chapter text, in reading order.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = fold_str(query.trim());
        if needle.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for chapter in &self.chapters {
            for (start, end) in find_matches(&chapter.text, &needle) {
                hits.push(SearchHit {
                    chapter_index: chapter.index,
                    chapter_title: chapter.title.clone(),
                    offset: start,
                    snippet: snippet(&chapter.text, start, end),
                });
            }
        }
        hits
    }

    pub fn word_count(&self) -> usize {
        self.chapters.iter().map(Chapter::word_count).sum()
    }

    /// Plain nested value for JSON export. `include_raw` controls whether each
    /// chapter's `raw_markup` is kept.
    pub fn to_value(&self, include_raw: bool) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if !include_raw
            && let Some(chapters) = value.get_mut("chapters").and_then(Value::as_array_mut)
        {
            for chapter in chapters {
                if let Some(obj) = chapter.as_object_mut() {
                    obj.remove("raw_markup");
                }
            }
        }
        Ok(value)
    }

    pub fn to_json(&self, include_raw: bool, pretty: bool) -> Result<String> {
        let value = self.to_value(include_raw)?;
        let json = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(json)
    }
}

/// Lowercase one char for matching. Final sigma folds to plain sigma so the
/// result does not depend on the letter's position in a word.
fn fold_case(c: char) -> impl Iterator<Item = char> {
    c.to_lowercase().map(|c| if c == 'ς' { 'σ' } else { c })
}

fn fold_str(s: &str) -> String {
    s.chars().flat_map(fold_case).collect()
}

/// Byte ranges in `haystack` whose folded form contains `needle` (already
/// folded), non-overlapping, in order.
fn find_matches(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    // Folded text plus, per folded byte, the original char's byte range.
    let mut folded = String::with_capacity(haystack.len());
    let mut origin: Vec<(usize, usize)> = Vec::with_capacity(haystack.len());
    for (i, c) in haystack.char_indices() {
        let before = folded.len();
        folded.extend(fold_case(c));
        origin.extend(std::iter::repeat_n((i, i + c.len_utf8()), folded.len() - before));
    }

    folded
        .match_indices(needle)
        .map(|(start, m)| (origin[start].0, origin[start + m.len() - 1].1))
        .collect()
}

fn snippet(text: &str, start: usize, end: usize) -> String {
    let before: String = {
        let chars: Vec<char> = text[..start].chars().rev().take(SNIPPET_CONTEXT).collect();
        chars.into_iter().rev().collect()
    };
    let after: String = text[end..].chars().take(SNIPPET_CONTEXT).collect();

    let mut out = String::new();
    if before.len() < start {
        out.push_str("...");
    }
    out.push_str(&before);
    out.push_str(&text[start..end]);
    out.push_str(&after);
    if end + after.len() < text.len() {
        out.push_str("...");
    }
    out
}
