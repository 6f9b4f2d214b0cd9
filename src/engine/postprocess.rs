//! Deterministic cleanup of VLM-generated Markdown.
//!
//! Models occasionally wrap their answer in a ```markdown fence, emit CRLF
//! line endings, pad lines, or leak zero-width characters copied from the
//! page. These passes fix such quirks without touching content.
//!
//! Order matters: the fence is stripped before line endings are normalised
//! so the fence regex sees the raw answer, and the final-newline pass runs
//! last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup pass to one page of model output.
pub fn clean_markdown(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = s.replace("\r\n", "\n").replace('\r', "\n");
    let s = trim_line_ends(&s);
    let s = drop_invisible_chars(&s);
    let s = squeeze_blank_lines(&s);
    finish_with_newline(&s)
}

/// Join cleaned pages of one document.
pub fn join_pages(pages: &[String]) -> String {
    let joined = pages
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    finish_with_newline(&joined)
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

fn trim_line_ends(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}', '\u{00AD}',
];

fn drop_invisible_chars(input: &str) -> String {
    input.replace(INVISIBLE, "")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn squeeze_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n").into_owned()
}

fn finish_with_newline(input: &str) -> String {
    let body = input.trim_end();
    if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    }
}
