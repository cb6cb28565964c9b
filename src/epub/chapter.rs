//! Chapter extraction: one [`Chapter`] per spine entry.

use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::book::{Chapter, ImageContent, TableContent, TocEntry};
use crate::dom::{Dom, NodeId, outer_html, parse_markup};
use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::util::{decode_text, resolve_path, strip_fragment};

use super::archive::Package;
use super::parser::OpfData;

/// Extract every spine entry in reading order.
///
/// Indices are assigned before any failure is known, so an entry that cannot
/// be read or parsed leaves a gap instead of shifting its successors.
pub fn extract_chapters<R: Read + Seek>(
    package: &mut Package<R>,
    opf: &OpfData,
    toc: &[TocEntry],
    options: &ParseOptions,
) -> Vec<Chapter> {
    let mut chapters = Vec::with_capacity(opf.spine.len());
    let mut total: u64 = 0;

    for (index, spine_ref) in opf.spine.iter().enumerate() {
        let Some(item) = opf.manifest.get(&spine_ref.idref) else {
            warn!(index, idref = %spine_ref.idref, "Spine entry not in manifest, skipping");
            continue;
        };
        // Same normal form as TOC hrefs.
        let file = resolve_path("", &item.href);

        let bytes = match package.read_relative(&file) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(index, href = %file, %error, "Cannot read chapter, skipping");
                continue;
            }
        };

        let size = bytes.len() as u64;
        if total.saturating_add(size) > options.max_total_size {
            warn!(
                index,
                href = %file,
                limit = options.max_total_size,
                "Book size budget exhausted, skipping chapter"
            );
            continue;
        }

        match build_chapter(index, &file, &decode_text(&bytes), toc, options) {
            Ok(mut chapter) => {
                total += size;
                chapter.linear = spine_ref.linear;
                chapters.push(chapter);
            }
            Err(error) => {
                warn!(index, href = %file, %error, "Cannot parse chapter, skipping");
            }
        }
    }

    debug!(
        spine = opf.spine.len(),
        extracted = chapters.len(),
        bytes = total,
        "Chapters extracted"
    );
    chapters
}

/// Parse one content document and pull out its text and embedded content.
pub fn build_chapter(
    index: usize,
    file: &str,
    markup: &str,
    toc: &[TocEntry],
    options: &ParseOptions,
) -> Result<Chapter> {
    let dom = parse_markup(markup);

    let depth = dom.max_depth();
    if depth > options.max_depth {
        return Err(Error::InvalidEpub(format!(
            "element nesting depth {} exceeds limit of {}",
            depth, options.max_depth
        )));
    }

    let root = dom.document();
    Ok(Chapter {
        index,
        file: file.to_string(),
        title: match_title(toc, file),
        linear: true,
        raw_markup: markup.to_string(),
        text: plain_text(&dom, root),
        tables: dom
            .elements_by_tag(root, "table")
            .map(|table| extract_table(&dom, table))
            .collect(),
        images: dom
            .elements_by_tag(root, "img")
            .map(|img| extract_image(&dom, img))
            .collect(),
        charts: dom
            .elements_by_tag(root, "svg")
            .map(|svg| outer_html(&dom, svg))
            .collect(),
    })
}

/// Title of the first TOC entry whose href starts with the chapter's path.
///
/// `None` means no entry matched; an entry with an empty label yields
/// `Some("")`.
pub fn match_title(toc: &[TocEntry], file: &str) -> Option<String> {
    let base = strip_fragment(file);
    toc.iter()
        .find(|entry| entry.href.starts_with(base))
        .map(|entry| entry.title.clone())
}

/// Every text node, trimmed, non-empty ones joined by single spaces.
fn plain_text(dom: &Dom, root: NodeId) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for id in dom.descendants(root) {
        if let Some(text) = dom.text_content(id) {
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    parts.join(" ")
}

fn extract_table(dom: &Dom, table: NodeId) -> TableContent {
    let caption = dom
        .find_by_tag(table, "caption")
        .map(|caption| dom.text_of(caption).trim().to_string())
        .unwrap_or_default();

    let rows = dom
        .elements_by_tag(table, "tr")
        .map(|row| {
            dom.descendants(row)
                .filter(|&cell| {
                    dom.element_name(cell)
                        .is_some_and(|n| &**n == "td" || &**n == "th")
                })
                .map(|cell| dom.text_of(cell).trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    TableContent {
        markup: outer_html(dom, table),
        rows,
        caption,
    }
}

fn extract_image(dom: &Dom, img: NodeId) -> ImageContent {
    let attr = |name: &str| dom.get_attr(img, name).unwrap_or_default().to_string();

    let caption = dom
        .ancestors(img)
        .find(|&a| dom.element_name(a).is_some_and(|n| &**n == "figure"))
        .and_then(|figure| dom.find_by_tag(figure, "figcaption"))
        .map(|caption| dom.text_of(caption).trim().to_string())
        .unwrap_or_default();

    ImageContent {
        src: attr("src"),
        alt: attr("alt"),
        title: attr("title"),
        caption,
    }
}
