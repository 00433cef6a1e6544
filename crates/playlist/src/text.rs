//! Title clean-up shared by identity keys and display titles.

use crate::consts::{
    BARE_YEAR_REGEX, BRACKETED_TAG_REGEX, NOISE_TOKEN_REGEX, UNSAFE_FILENAME_REGEX, WHITESPACE_REGEX,
    WRAPPED_YEAR_REGEX,
};
use std::ops::Range;

// Various quotation marks: '"''""„‛`«»‹›
const QUOTATION_MARKS: [char; 13] = [
    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}', '\u{0060}',
    '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
];

/// Scene-style titles use dots or underscores instead of spaces.
fn spaced(s: &str) -> String {
    if s.chars().any(char::is_whitespace) {
        s.to_string()
    } else {
        s.replace(['.', '_'], " ")
    }
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_REGEX.replace_all(s.trim(), " ").into_owned()
}

fn has_alphanumeric(s: &str) -> bool {
    s.chars().any(char::is_alphanumeric)
}

fn strip_noise(s: &str) -> String {
    NOISE_TOKEN_REGEX.replace_all(s, " ").into_owned()
}

fn strip_tags(s: &str) -> String {
    let stripped = BRACKETED_TAG_REGEX.replace_all(s, " ");
    match has_alphanumeric(&stripped) {
        true => stripped.into_owned(),
        false => s.to_string(),
    }
}

/// Locate the release year: the first bracketed year, otherwise the last bare
/// year as long as it isn't the entire title (think "1917").
fn find_year(s: &str) -> Option<(Range<usize>, u16)> {
    if let Some(captures) = WRAPPED_YEAR_REGEX.captures(s) {
        let whole = captures.get(0)?;
        let year = captures.get(1)?.as_str().parse().ok()?;
        return Some((whole.range(), year));
    }
    let found = BARE_YEAR_REGEX.find_iter(s).last()?;
    if !has_alphanumeric(&s[..found.start()]) && !has_alphanumeric(&s[found.end()..]) {
        return None;
    }
    Some((found.range(), found.as_str().parse().ok()?))
}

fn strip_year(s: &str) -> String {
    match find_year(s) {
        Some((range, _)) => format!("{} {}", &s[..range.start], &s[range.end..]),
        None => s.to_string(),
    }
}

/// Pulls a plausible release year out of a raw playlist title.
pub(crate) fn extract_year(raw: &str) -> Option<u16> {
    find_year(&strip_noise(&spaced(raw))).map(|(_, year)| year)
}

/// Lowercase slug of a title with release noise, bracketed tags and the year
/// removed. May be empty when nothing recognisable is left.
pub(crate) fn canonical_slug(raw: &str) -> String {
    let cleaned = strip_tags(&strip_year(&strip_noise(&spaced(raw))));
    let unquoted: String = cleaned.chars().filter(|c| !QUOTATION_MARKS.contains(c)).collect();
    rslug::slugify!(&collapse_whitespace(&unquoted))
}

/// Human-readable title safe to use as a single path segment.
pub(crate) fn display_title(raw: &str) -> String {
    let cleaned = strip_tags(&strip_year(&strip_noise(&spaced(raw))));
    let safe = UNSAFE_FILENAME_REGEX.replace_all(&cleaned, " ");
    let title = collapse_whitespace(&safe).trim_matches(|c: char| c == '.' || c == '-' || c.is_whitespace()).to_string();
    match title.is_empty() {
        true => collapse_whitespace(&UNSAFE_FILENAME_REGEX.replace_all(raw, " ")),
        false => title,
    }
}
