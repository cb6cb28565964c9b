//! Read access to the ZIP container of a package.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Error, Result};
use crate::options::ParseOptions;
use crate::util::resolve_path;

/// An open package archive plus the directory of its root document.
///
/// Owned by a single parse call. The archive is released by [`Package::close`]
/// or when the value is dropped.
pub struct Package<R = File> {
    archive: Option<ZipArchive<R>>,
    base_dir: String,
    max_entry_size: u64,
}

impl Package<File> {
    /// Open a package file from disk.
    ///
    /// Fails with [`Error::NotFound`] when the path does not exist and with
    /// [`Error::Zip`] when the file is not a ZIP container.
    pub fn open<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_reader(file, options)
    }
}

impl<R: Read + Seek> Package<R> {
    /// Open a package from any [`Read`] + [`Seek`] source.
    pub fn from_reader(reader: R, options: &ParseOptions) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        Ok(Self {
            archive: Some(archive),
            base_dir: String::new(),
            max_entry_size: options.max_entry_size,
        })
    }

    /// Directory containing the root package document, without trailing slash.
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, dir: impl Into<String>) {
        self.base_dir = dir.into();
    }

    /// Resolve an href relative to the base directory.
    pub fn resolve(&self, href: &str) -> String {
        resolve_path(&self.base_dir, href)
    }

    /// Read an entry by its full archive name.
    ///
    /// Names that are not found verbatim are retried percent-decoded, since
    /// hrefs in package documents are URL-encoded but ZIP names usually are
    /// not.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let limit = self.max_entry_size;
        let archive = self
            .archive
            .as_mut()
            .ok_or_else(|| Error::InvalidEpub("package is closed".into()))?;

        match read_entry(archive, name, limit) {
            Err(Error::MissingEntry(_)) => {}
            other => return other,
        }

        let decoded = percent_encoding::percent_decode_str(name)
            .decode_utf8()
            .map_err(|_| Error::MissingEntry(name.to_string()))?;
        if decoded == name {
            return Err(Error::MissingEntry(name.to_string()));
        }
        read_entry(archive, &decoded, limit)
    }

    /// Read an entry addressed relative to the base directory.
    pub fn read_relative(&mut self, href: &str) -> Result<Vec<u8>> {
        let full = self.resolve(href);
        self.read(&full)
    }

    /// Release the archive. Calling this more than once is harmless.
    pub fn close(&mut self) {
        self.archive = None;
    }

    pub fn is_closed(&self) -> bool {
        self.archive.is_none()
    }
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<Vec<u8>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Err(Error::MissingEntry(name.to_string())),
        Err(e) => return Err(e.into()),
    };

    let too_large = || Error::EntryTooLarge {
        name: name.to_string(),
        limit,
    };

    if file.size() > limit {
        return Err(too_large());
    }

    // The declared size can lie; cap what is actually inflated as well.
    let mut contents = Vec::with_capacity(file.size() as usize);
    file.take(limit.saturating_add(1)).read_to_end(&mut contents)?;
    if contents.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(contents)
}
