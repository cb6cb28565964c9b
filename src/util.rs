//! Small helpers shared by the package, TOC and chapter readers.

use std::borrow::Cow;

/// Decode bytes as UTF-8, substituting U+FFFD for invalid sequences.
///
/// A leading byte order mark is removed. Never fails.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, _had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    text
}

/// Strip the UTF-8 byte order mark if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Directory part of an archive path, without a trailing slash.
///
/// `"OEBPS/content.opf"` gives `"OEBPS"`, `"content.opf"` gives `""`.
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Join `relative` onto `base` and normalize `.` and `..` segments.
///
/// Purely lexical: the target does not need to exist. `..` segments that
/// would climb above the archive root are dropped. A fragment suffix on
/// `relative` is carried over untouched.
pub fn resolve_path(base: &str, relative: &str) -> String {
    let (path, fragment) = match relative.find('#') {
        Some(i) => (&relative[..i], Some(&relative[i..])),
        None => (relative, None),
    };

    let mut segments: Vec<&str> = Vec::new();
    let joined = if path.starts_with('/') || base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    };

    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = segments.join("/");
    if let Some(fragment) = fragment {
        out.push_str(fragment);
    }
    out
}

/// Remove a `#fragment` suffix.
pub fn strip_fragment(href: &str) -> &str {
    href.split_once('#').map(|(base, _)| base).unwrap_or(href)
}

/// Keep the `YYYY-MM-DD` prefix of dates longer than ten characters.
pub fn normalize_date(date: &str) -> String {
    match date.char_indices().nth(10) {
        Some((cut, _)) => date[..cut].to_string(),
        None => date.to_string(),
    }
}

/// Whitespace-separated token list membership, as used by `properties` and
/// `epub:type` attributes.
pub fn has_token(list: &str, token: &str) -> bool {
    list.split_ascii_whitespace().any(|t| t == token)
}
