//! Strict XML parsing of the package structure (container.xml, OPF, NCX).

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};

use crate::book::Metadata;
use crate::error::{Error, Result};
use crate::util::{has_token, normalize_date, strip_bom};

/// Media type of EPUB2 NCX navigation documents.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// One `<item>` of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Relative to the directory of the package document.
    pub href: String,
    pub media_type: String,
    /// Whitespace-separated `properties` tokens, empty when absent.
    pub properties: String,
}

impl ManifestItem {
    pub fn has_property(&self, token: &str) -> bool {
        has_token(&self.properties, token)
    }
}

/// Manifest items in document order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    items: Vec<ManifestItem>,
    by_id: HashMap<String, usize>,
}

impl Manifest {
    /// Add an item. A repeated id keeps its first definition.
    pub fn insert(&mut self, item: ManifestItem) {
        if self.by_id.contains_key(&item.id) {
            return;
        }
        self.by_id.insert(item.id.clone(), self.items.len());
        self.items.push(item);
    }

    pub fn get(&self, id: &str) -> Option<&ManifestItem> {
        self.by_id.get(id).map(|&i| &self.items[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An `<itemref>` of the spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineRef {
    pub idref: String,
    pub linear: bool,
}

/// Parsed OPF package data.
#[derive(Debug, Clone)]
pub struct OpfData {
    pub metadata: Metadata,
    pub manifest: Manifest,
    /// Reading order, duplicates preserved.
    pub spine: Vec<SpineRef>,
    /// Manifest id named by the spine's `toc` attribute.
    pub spine_toc: Option<String>,
}

impl OpfData {
    /// The EPUB3 navigation document, if any (first in manifest order).
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.has_property("nav"))
    }

    /// The NCX document: the spine's `toc` reference, else the first item with
    /// the NCX media type.
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.spine_toc
            .as_deref()
            .and_then(|id| self.manifest.get(id))
            .or_else(|| {
                self.manifest
                    .iter()
                    .find(|item| item.media_type == NCX_MEDIA_TYPE)
            })
    }
}

/// Parse `META-INF/container.xml` and return the root document path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if local_name(e.name().as_ref()) == b"rootfile" => {
                if let Some(path) = attr(&e, b"full-path")
                    && !path.is_empty()
                {
                    return Ok(path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

/// Metadata fields collected in document order before defaults are applied.
#[derive(Default)]
struct RawMetadata {
    titles: Vec<String>,
    creators: Vec<String>,
    descriptions: Vec<String>,
    languages: Vec<String>,
    publishers: Vec<String>,
    dates: Vec<String>,
    /// (id attribute, text)
    identifiers: Vec<(String, String)>,
    subjects: Vec<String>,
    /// `<meta name=.. content=..>` pairs
    named_meta: Vec<(String, String)>,
    /// EPUB3 `<meta property=..>` entries
    property_meta: Vec<PropertyMeta>,
}

struct PropertyMeta {
    property: String,
    refines: String,
    id: String,
    text: String,
}

impl RawMetadata {
    fn named(&self, name: &str) -> Option<&str> {
        self.named_meta
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    /// EPUB3 series: `belongs-to-collection` plus its `group-position` refinement.
    fn collection(&self) -> Option<(String, String)> {
        let collection = self
            .property_meta
            .iter()
            .find(|m| m.property == "belongs-to-collection" && m.refines.is_empty())?;
        let position = self
            .property_meta
            .iter()
            .find(|m| {
                m.property == "group-position"
                    && !collection.id.is_empty()
                    && m.refines.strip_prefix('#') == Some(collection.id.as_str())
            })
            .map(|m| m.text.clone())
            .unwrap_or_default();
        Some((collection.text.clone(), position))
    }

    fn into_metadata(self, cover_image: String) -> Metadata {
        let first = |values: &[String]| values.first().cloned().unwrap_or_default();

        let (series, series_index) = match self.named("calibre:series") {
            Some(series) => (
                series.to_string(),
                self.named("calibre:series_index").unwrap_or_default().to_string(),
            ),
            None => self.collection().unwrap_or_default(),
        };

        let isbn = self
            .identifiers
            .iter()
            .find(|(id, _)| id.to_lowercase().contains("isbn"))
            .map(|(_, text)| text.clone())
            .unwrap_or_default();

        Metadata {
            title: self
                .titles
                .first()
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| Metadata::UNKNOWN.to_string()),
            author: if self.creators.is_empty() {
                Metadata::UNKNOWN.to_string()
            } else {
                self.creators.join(" & ")
            },
            description: first(&self.descriptions),
            language: first(&self.languages),
            publisher: first(&self.publishers),
            date: normalize_date(&first(&self.dates)),
            isbn,
            identifier: self
                .identifiers
                .first()
                .map(|(_, text)| text.clone())
                .unwrap_or_default(),
            tags: self.subjects,
            series,
            series_index,
            cover_image,
        }
    }
}

/// Dublin Core elements captured as text inside `<metadata>`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Creator,
    Description,
    Language,
    Publisher,
    Date,
    Identifier,
    Subject,
    Meta,
}

impl Field {
    fn from_local(local: &[u8]) -> Option<Self> {
        Some(match local {
            b"title" => Field::Title,
            b"creator" => Field::Creator,
            b"description" => Field::Description,
            b"language" => Field::Language,
            b"publisher" => Field::Publisher,
            b"date" => Field::Date,
            b"identifier" => Field::Identifier,
            b"subject" => Field::Subject,
            b"meta" => Field::Meta,
            _ => return None,
        })
    }
}

/// A metadata element whose text is being collected.
struct Capture {
    field: Field,
    qname: Vec<u8>,
    id: String,
    property: Option<String>,
    refines: String,
}

impl RawMetadata {
    fn push(&mut self, capture: Capture, text: String) {
        match capture.field {
            Field::Title => self.titles.push(text),
            Field::Creator => self.creators.push(text),
            Field::Description => self.descriptions.push(text),
            Field::Language => self.languages.push(text),
            Field::Publisher => self.publishers.push(text),
            Field::Date => self.dates.push(text),
            Field::Identifier => self.identifiers.push((capture.id, text)),
            Field::Subject => self.subjects.push(text),
            Field::Meta => {
                if let Some(property) = capture.property {
                    self.property_meta.push(PropertyMeta {
                        property,
                        refines: capture.refines,
                        id: capture.id,
                        text,
                    });
                }
            }
        }
    }
}

/// Parse an OPF package document.
///
/// Any XML error is fatal: a broken package document cannot be trusted to
/// describe the reading order.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);

    let mut raw = RawMetadata::default();
    let mut manifest = Manifest::default();
    let mut spine = Vec::new();
    let mut spine_toc = None;
    let mut epub2_cover_id: Option<String> = None;
    let mut saw_package = false;
    let mut closed_package = false;

    let mut in_metadata = false;
    let mut current: Option<Capture> = None;
    let mut buf_text = String::new();

    loop {
        let event = reader.read_event()?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"package" => {
                    saw_package = true;
                    closed_package = is_empty;
                }
                b"metadata" => in_metadata = !is_empty,
                b"item" => {
                    let id = attr(&e, b"id").unwrap_or_default();
                    if !id.is_empty() {
                        manifest.insert(ManifestItem {
                            id,
                            href: attr(&e, b"href").unwrap_or_default(),
                            media_type: attr(&e, b"media-type").unwrap_or_default(),
                            properties: attr(&e, b"properties").unwrap_or_default(),
                        });
                    }
                }
                b"spine" => spine_toc = attr(&e, b"toc"),
                b"itemref" => {
                    if let Some(idref) = attr(&e, b"idref") {
                        spine.push(SpineRef {
                            idref,
                            linear: attr(&e, b"linear").as_deref() != Some("no"),
                        });
                    }
                }
                local if in_metadata => {
                    let Some(field) = Field::from_local(local) else {
                        continue;
                    };
                    if field == Field::Meta
                        && let (Some(n), Some(c)) = (attr(&e, b"name"), attr(&e, b"content"))
                    {
                        if n == "cover" {
                            epub2_cover_id = Some(c.clone());
                        }
                        raw.named_meta.push((n, c));
                    }
                    // Self-closing elements carry no text.
                    if !is_empty {
                        current = Some(Capture {
                            field,
                            qname: e.name().as_ref().to_vec(),
                            id: attr(&e, b"id").unwrap_or_default(),
                            property: attr(&e, b"property"),
                            refines: attr(&e, b"refines").unwrap_or_default(),
                        });
                        buf_text.clear();
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if current.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if current.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if current.is_some()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    buf_text.push_str(&resolved);
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = false,
                    b"package" => closed_package = true,
                    _ => {}
                }

                let closes_current = current
                    .as_ref()
                    .is_some_and(|c| c.qname.as_slice() == name.as_ref());
                if closes_current && let Some(capture) = current.take() {
                    let text = buf_text.trim().to_string();
                    buf_text.clear();
                    raw.push(capture, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_package {
        return Err(Error::InvalidEpub(
            "Package document has no <package> element".into(),
        ));
    }
    // quick-xml does not report elements left open at end of input.
    if !closed_package {
        return Err(Error::InvalidEpub("Package document is truncated".into()));
    }

    // EPUB3 "cover-image" property takes priority over the EPUB2 meta
    let cover_image = manifest
        .iter()
        .find(|item| item.has_property("cover-image"))
        .or_else(|| epub2_cover_id.as_deref().and_then(|id| manifest.get(id)))
        .map(|item| item.href.clone())
        .unwrap_or_default();

    Ok(OpfData {
        metadata: raw.into_metadata(cover_image),
        manifest,
        spine,
        spine_toc,
    })
}

/// Parse an NCX document into flat `(label, src)` pairs.
///
/// Every `navPoint` is visited in document order, parents before their
/// children. Points without a non-empty label and source are left out.
pub fn parse_ncx(content: &str) -> Result<Vec<(String, String)>> {
    #[derive(Default)]
    struct NavSlot {
        label: String,
        label_done: bool,
        src: String,
    }

    let mut reader = Reader::from_str(content);

    // One slot per navPoint in start order; the stack holds the open ones.
    let mut slots: Vec<NavSlot> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut in_text = false;

    loop {
        let event = reader.read_event()?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => {
                    slots.push(NavSlot::default());
                    if !is_empty {
                        stack.push(slots.len() - 1);
                    }
                }
                b"text" => in_text = !is_empty,
                b"content" => {
                    if let (Some(&slot), Some(src)) = (stack.last(), attr(&e, b"src"))
                        && slots[slot].src.is_empty()
                    {
                        slots[slot].src = src;
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if in_text && let Some(&slot) = stack.last() {
                    let slot = &mut slots[slot];
                    if !slot.label_done {
                        slot.label.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
            }
            Event::CData(e) => {
                if in_text && let Some(&slot) = stack.last() {
                    let slot = &mut slots[slot];
                    if !slot.label_done {
                        slot.label.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Event::GeneralRef(e) => {
                if in_text
                    && let Some(&slot) = stack.last()
                    && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                {
                    let slot = &mut slots[slot];
                    if !slot.label_done {
                        slot.label.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => {
                    in_text = false;
                    // Only the first label text of a point counts.
                    if let Some(&slot) = stack.last() {
                        slots[slot].label_done = true;
                    }
                }
                b"navPoint" => {
                    stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(slots
        .into_iter()
        .map(|slot| (slot.label.trim().to_string(), slot.src.trim().to_string()))
        .filter(|(label, src)| !label.is_empty() && !src.is_empty())
        .collect())
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Unescaped value of an attribute matched by local name.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| unescape(&String::from_utf8_lossy(&a.value)))
}

/// Replace entity references in an attribute value. A value with an
/// unknown or malformed reference is kept verbatim.
fn unescape(raw: &str) -> String {
    unescape_with(raw, named_entity)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Named entities: the XML predefined set plus `nbsp`, which is common in
/// hand-written package documents.
fn named_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{00A0}"),
        other => resolve_predefined_entity(other),
    }
}

/// Resolve the body of an entity or character reference.
fn resolve_entity(entity: &str) -> Option<String> {
    if let Some(named) = named_entity(entity) {
        return Some(named.to_string());
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };

    code.and_then(char::from_u32).map(|c| c.to_string())
}
