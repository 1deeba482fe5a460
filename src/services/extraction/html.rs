// HTML Extraction
// Visible text only: non-rendered blocks dropped, tags become separators

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::services::text_cleaner::collapse_whitespace;

static HIDDEN_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|template|head)\b[^>]*>.*?</(?:script|style|noscript|template|head)\s*>")
        .expect("hidden block regex")
});
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity regex"));

pub fn extract_html(bytes: &[u8]) -> String {
    let raw = String::from_utf8_lossy(bytes);
    let without_comments = COMMENT_RE.replace_all(&raw, " ");
    let visible = HIDDEN_BLOCK_RE.replace_all(&without_comments, " ");
    let untagged = TAG_RE.replace_all(&visible, " ");
    collapse_whitespace(&decode_entities(&untagged))
}

/// Decode named and numeric character references. Unknown names are left as written.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "copy" => '\u{00a9}',
        "reg" => '\u{00ae}',
        "trade" => '\u{2122}',
        "euro" => '\u{20ac}',
        "pound" => '\u{00a3}',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_only() {
        let html = br#"<html><head><title>Ignored</title><style>p { color: red; }</style></head>
            <body><h1>Headline</h1><!-- tracking --><p>Body&nbsp;text &amp; more</p>
            <script>var x = "<p>not shown</p>";</script><p>End</p></body></html>"#;
        assert_eq!(extract_html(html), "Headline Body text & more End");
    }

    #[test]
    fn test_tags_separate_words() {
        assert_eq!(extract_html(b"<p>one</p><p>two</p>"), "one two");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("&#65;&#x42;&lt;&unknown;"), "AB<&unknown;");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(extract_html(b"<html><body>  </body></html>"), "");
    }
}
