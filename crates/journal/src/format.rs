//! Plain-text rendering of raw journal text for chat replies.

use std::sync::LazyLock;

use regex::Regex;

static PROPERTIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s):PROPERTIES:.*?:END:").expect("valid properties regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*#\+title:.*$").expect("valid title regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\*+[ \t]+(.+?)[ \t]*$").expect("valid heading regex"));
static ESCAPED_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^,(,*(?:\*|#\+))").expect("valid escape regex"));
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n([ \t]*\n){2,}").expect("valid blank-run regex"));

/// Strip org structure from `raw` for display.
///
/// Properties drawers and `#+title:` lines are removed, every heading becomes
/// `*text*` (emphasis rather than an outline marker), comma-escaped body lines
/// get their escape removed, runs of blank lines collapse to one and the result
/// is trimmed.
pub fn format_for_display(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let text = PROPERTIES_RE.replace_all(&text, "");
    let text = TITLE_RE.replace_all(&text, "");
    let text = HEADING_RE.replace_all(&text, "*$1*");
    let text = ESCAPED_LINE_RE.replace_all(&text, "$1");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}
