//! Fixture packages built on the fly.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Builder for a minimal EPUB with its package document at `OEBPS/content.opf`.
pub struct Fixture {
    metadata: String,
    items: Vec<(String, String, String, String)>,
    spine: Vec<String>,
    spine_toc: Option<String>,
    files: Vec<(String, Vec<u8>)>,
    container: Option<String>,
    opf_override: Option<String>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            metadata: "<dc:title>Fixture Book</dc:title>\n<dc:creator>Ann Author</dc:creator>\n<dc:language>en</dc:language>".to_string(),
            items: Vec::new(),
            spine: Vec::new(),
            spine_toc: None,
            files: Vec::new(),
            container: Some(CONTAINER_XML.to_string()),
            opf_override: None,
        }
    }

    /// Replace the inner XML of `<metadata>`.
    pub fn metadata(mut self, xml: &str) -> Self {
        self.metadata = xml.to_string();
        self
    }

    /// Add a manifest item and its backing file under `OEBPS/`.
    pub fn item(mut self, id: &str, href: &str, media_type: &str, body: &str) -> Self {
        self.items
            .push((id.into(), href.into(), media_type.into(), String::new()));
        self.files
            .push((format!("OEBPS/{href}"), body.as_bytes().to_vec()));
        self
    }

    /// Add a manifest item without writing its file.
    pub fn dangling_item(mut self, id: &str, href: &str) -> Self {
        self.items.push((
            id.into(),
            href.into(),
            "application/xhtml+xml".into(),
            String::new(),
        ));
        self
    }

    /// Add an XHTML chapter to the manifest and the spine.
    pub fn chapter(self, id: &str, href: &str, body: &str) -> Self {
        self.item(id, href, "application/xhtml+xml", body).spine_ref(id)
    }

    /// Add an EPUB3 navigation document.
    pub fn nav(mut self, href: &str, body: &str) -> Self {
        self.items.push((
            "nav".into(),
            href.into(),
            "application/xhtml+xml".into(),
            "nav".into(),
        ));
        self.files
            .push((format!("OEBPS/{href}"), body.as_bytes().to_vec()));
        self
    }

    /// Add a chapter whose manifest href differs from its archive entry name.
    pub fn chapter_stored_as(mut self, id: &str, href: &str, entry: &str, body: &str) -> Self {
        self = self.dangling_item(id, href).spine_ref(id);
        self.files.push((entry.into(), body.as_bytes().to_vec()));
        self
    }

    /// Declare a navigation document without writing its file.
    pub fn missing_nav(mut self, href: &str) -> Self {
        self.items.push((
            "nav".into(),
            href.into(),
            "application/xhtml+xml".into(),
            "nav".into(),
        ));
        self
    }

    /// Add an EPUB2 NCX referenced from the spine.
    pub fn ncx(mut self, href: &str, body: &str) -> Self {
        self = self.item("ncx", href, "application/x-dtbncx+xml", body);
        self.spine_toc = Some("ncx".into());
        self
    }

    pub fn spine_ref(mut self, idref: &str) -> Self {
        self.spine.push(idref.into());
        self
    }

    /// Add a raw archive entry.
    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.files.push((name.into(), data.to_vec()));
        self
    }

    /// Store `opf` instead of the generated package document.
    pub fn raw_opf(mut self, opf: &str) -> Self {
        self.opf_override = Some(opf.to_string());
        self
    }

    pub fn without_container(mut self) -> Self {
        self.container = None;
        self
    }

    pub fn opf(&self) -> String {
        let manifest: String = self
            .items
            .iter()
            .map(|(id, href, media_type, props)| {
                if props.is_empty() {
                    format!(r#"    <item id="{id}" href="{href}" media-type="{media_type}"/>"#)
                } else {
                    format!(
                        r#"    <item id="{id}" href="{href}" media-type="{media_type}" properties="{props}"/>"#
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let spine: String = self
            .spine
            .iter()
            .map(|idref| format!(r#"    <itemref idref="{idref}"/>"#))
            .collect::<Vec<_>>()
            .join("\n");
        let toc_attr = self
            .spine_toc
            .as_ref()
            .map(|id| format!(r#" toc="{id}""#))
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
{}
  </metadata>
  <manifest>
{manifest}
  </manifest>
  <spine{toc_attr}>
{spine}
  </spine>
</package>"#,
            self.metadata
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        if let Some(container) = &self.container {
            zip.start_file("META-INF/container.xml", deflated).unwrap();
            zip.write_all(container.as_bytes()).unwrap();
        }

        zip.start_file("OEBPS/content.opf", deflated).unwrap();
        let opf = self.opf_override.clone().unwrap_or_else(|| self.opf());
        zip.write_all(opf.as_bytes()).unwrap();

        for (name, data) in &self.files {
            zip.start_file(name.as_str(), deflated).unwrap();
            zip.write_all(data).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    /// Write the package into `dir` as `name`.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).unwrap();
        path
    }

    /// Write the package into a fresh temporary directory.
    pub fn write(&self) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = self.write_to(dir.path(), "book.epub");
        (dir, path)
    }
}

pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title></head>
<body>
{body}
</body>
</html>"#
    )
}

pub fn nav_doc(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(title, href)| format!(r#"<li><a href="{href}">{title}</a></li>"#))
        .collect();
    xhtml(
        "Contents",
        &format!(r#"<nav epub:type="toc" id="toc"><h1>Contents</h1><ol>{items}</ol></nav>"#),
    )
}

pub fn ncx_doc(entries: &[(&str, &str)]) -> String {
    let points: String = entries
        .iter()
        .enumerate()
        .map(|(i, (title, src))| {
            format!(
                r#"<navPoint id="np{i}" playOrder="{}"><navLabel><text>{title}</text></navLabel><content src="{src}"/></navPoint>"#,
                i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="x"/></head>
  <docTitle><text>Fixture Book</text></docTitle>
  <navMap>{points}</navMap>
</ncx>"#
    )
}

/// Three chapters with a navigation document pointing at each.
pub fn three_chapter_book() -> Fixture {
    Fixture::new()
        .nav(
            "nav.xhtml",
            &nav_doc(&[
                ("One", "text/ch1.xhtml"),
                ("Two", "text/ch2.xhtml"),
                ("Three", "text/ch3.xhtml"),
            ]),
        )
        .chapter(
            "ch1",
            "text/ch1.xhtml",
            &xhtml("One", "<h1>One</h1><p>Call me Ishmael.</p>"),
        )
        .chapter(
            "ch2",
            "text/ch2.xhtml",
            &xhtml("Two", "<h1>Two</h1><p>The whale surfaced.</p>"),
        )
        .chapter(
            "ch3",
            "text/ch3.xhtml",
            &xhtml("Three", "<h1>Three</h1><p>The end.</p>"),
        )
}
