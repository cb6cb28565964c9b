//! Table of contents extraction.
//!
//! The EPUB3 navigation document is tried first; the EPUB2 NCX only when the
//! navigation document yields nothing. The two sources are never merged.

use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::book::TocEntry;
use crate::dom::{Dom, NodeId, parse_markup};
use crate::options::TocMatch;
use crate::util::{decode_text, has_token, parent_dir, resolve_path};

use super::archive::Package;
use super::parser::{OpfData, parse_ncx};

/// Extract the table of contents. A book without one yields an empty list.
pub fn extract_toc<R: Read + Seek>(
    package: &mut Package<R>,
    opf: &OpfData,
    toc_match: TocMatch,
) -> Vec<TocEntry> {
    if let Some(nav) = opf.nav_item() {
        match package.read_relative(&nav.href) {
            Ok(bytes) => {
                let entries = nav_entries(&decode_text(&bytes), parent_dir(&nav.href), toc_match);
                if !entries.is_empty() {
                    debug!(href = %nav.href, entries = entries.len(), "TOC from navigation document");
                    return entries;
                }
            }
            Err(error) => warn!(href = %nav.href, %error, "Cannot read navigation document"),
        }
    }

    if let Some(ncx) = opf.ncx_item() {
        let parsed = package
            .read_relative(&ncx.href)
            .and_then(|bytes| parse_ncx(&decode_text(&bytes)));
        match parsed {
            Ok(points) => {
                let base = parent_dir(&ncx.href);
                let entries: Vec<_> = points
                    .into_iter()
                    .map(|(title, src)| TocEntry::new(title, resolve_path(base, &src)))
                    .collect();
                debug!(href = %ncx.href, entries = entries.len(), "TOC from NCX");
                return entries;
            }
            Err(error) => warn!(href = %ncx.href, %error, "Cannot parse NCX"),
        }
    }

    Vec::new()
}

/// Entries of a navigation document. `doc_dir` is the document's directory
/// relative to the package directory; hrefs are re-based onto the latter.
pub fn nav_entries(html: &str, doc_dir: &str, toc_match: TocMatch) -> Vec<TocEntry> {
    let dom = parse_markup(html);
    let mut entries = Vec::new();

    for nav in dom.elements_by_tag(dom.document(), "nav") {
        if !is_toc_nav(&dom, nav, toc_match) {
            continue;
        }
        for anchor in dom.elements_by_tag(nav, "a") {
            let title = dom.text_of(anchor).trim().to_string();
            let href = dom.get_attr(anchor, "href").unwrap_or_default().trim();
            if title.is_empty() || href.is_empty() {
                continue;
            }
            entries.push(TocEntry::new(title, resolve_path(doc_dir, href)));
        }
    }

    entries
}

fn is_toc_nav(dom: &Dom, nav: NodeId, toc_match: TocMatch) -> bool {
    match toc_match {
        TocMatch::TypeAttribute => ["epub:type", "type"]
            .iter()
            .filter_map(|name| dom.get_attr(nav, name))
            .any(|value| has_token(value, "toc")),
        TocMatch::AnyAttribute => dom.attrs(nav).iter().any(|a| a.value == "toc"),
    }
}
