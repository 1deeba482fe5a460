// Text Cleaning Service
// Normalizes any text before it reaches the classifier or the trend tally

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::config_store::CleanerConfig;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("url regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{3000}\u{00A0}]").expect("space regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize typographic punctuation to its ASCII form
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2014}', '\u{2013}'], "-")
        .replace('\u{2026}', "...");

    // Ideographic and non-breaking spaces
    SPACE_RE.replace_all(&s, " ").into_owned()
}

/// Remove markup tags, leaving a space where each tag was.
pub fn strip_html_tags(text: &str) -> String {
    TAG_RE.replace_all(text, " ").into_owned()
}

pub fn strip_urls(text: &str) -> String {
    URL_RE.replace_all(text, " ").into_owned()
}

/// Collapse runs of whitespace (including newlines) to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Full cleaning pass applied to model input.
pub fn clean_text(text: &str, config: &CleanerConfig) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut s = text.to_string();
    if config.strip_html {
        s = strip_html_tags(&s);
    }
    if config.strip_urls {
        s = strip_urls(&s);
    }
    if config.normalize_punctuation {
        s = normalize_punctuation(&s);
    }
    s = collapse_whitespace(&s);
    if config.lowercase {
        s = s.to_lowercase();
    }
    s
}
