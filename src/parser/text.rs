use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f-\x9f\x{200b}\x{200c}\x{200d}\x{feff}]").unwrap()
});
static INLINE_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static PAGE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-–—]?\s*\d+\s*[-–—]?\s*$").unwrap());

/// Normalize extracted text: NFKC, strip control and zero-width characters,
/// unify line endings, collapse whitespace runs, drop bare page-number lines.
pub fn clean(text: &str) -> String {
    let text: String = text.nfkc().collect();
    let text = CONTROL_RE.replace_all(&text, "");
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = INLINE_WS_RE.replace_all(&text, " ");
    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");

    let kept: Vec<&str> = text
        .split('\n')
        .filter(|line| !PAGE_NUMBER_RE.is_match(line))
        .collect();
    // dropping a page-number line can leave a fresh run of blank lines
    BLANK_LINES_RE.replace_all(&kept.join("\n"), "\n\n").trim().to_string()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}
