//! Small text normalisation helpers shared by the extractor, reconciler and
//! retrieval index.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics by decomposing to NFD and dropping combining marks.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key: diacritics removed, lowercased, whitespace collapsed.
pub fn fold(s: &str) -> String {
    collapse_whitespace(&strip_diacritics(s).to_lowercase())
}

/// Stable identifier derived from a display name.
///
/// `"Técnico em Desenvolvimento de Sistemas"` becomes
/// `"tecnico-em-desenvolvimento-de-sistemas"`.
pub fn slugify(name: &str) -> String {
    let folded = strip_diacritics(name).to_lowercase();
    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;
    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// First `n` characters of `s` (never splits a code point).
pub fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
