//! Parse configuration.

/// Which `<nav>` elements of a navigation document count as the table of
/// contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TocMatch {
    /// The `epub:type` (or plain `type`) attribute lists the `toc` token.
    #[default]
    TypeAttribute,
    /// Any attribute whose value is exactly `toc`, e.g. `<nav id="toc">`.
    AnyAttribute,
}

/// Limits and switches for one parse.
///
/// Packages are untrusted input; the limits bound memory use against
/// compression bombs and pathological nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Largest uncompressed archive entry that will be read.
    pub max_entry_size: u64,
    /// Total bytes of chapter documents kept for one book. Chapters past the
    /// budget are skipped.
    pub max_total_size: u64,
    /// Deepest element nesting accepted in a content document.
    pub max_depth: usize,
    pub toc_match: TocMatch,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_entry_size: 64 * 1024 * 1024,
            max_total_size: 512 * 1024 * 1024,
            max_depth: 512,
            toc_match: TocMatch::default(),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entry_size(mut self, bytes: u64) -> Self {
        self.max_entry_size = bytes;
        self
    }

    pub fn with_max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = bytes;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_toc_match(mut self, toc_match: TocMatch) -> Self {
        self.toc_match = toc_match;
        self
    }
}
