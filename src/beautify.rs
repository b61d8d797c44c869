//! Pretty-printing of emitted files.
//!
//! Formatting is pluggable through [`Beautifier`]. The built-in
//! [`WhitespaceBeautifier`] only normalizes whitespace, which is enough to
//! keep generated output stable and diff-friendly without reflowing markup.

use regex::Regex;
use std::sync::LazyLock;

pub trait Beautifier: Sync {
    fn html(&self, src: &str) -> String;
    fn css(&self, src: &str) -> String;
    fn js(&self, src: &str) -> String;
}

/// Elements whose text is content, not layout.
static RAW_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<pre\b[^>]*>.*?</pre\s*>|<textarea\b[^>]*>.*?</textarea\s*>|<script\b[^>]*>.*?</script\s*>",
    )
    .expect("raw block pattern is valid")
});

/// Stand-in for a raw block while the rest of the document is normalized.
/// NUL never occurs in well-formed HTML.
const HOLE: char = '\0';

/// Trims trailing whitespace, collapses runs of blank lines into one, and
/// ends non-empty output with a single newline.
///
/// In HTML the bodies of `<pre>`, `<textarea>` and `<script>` are kept
/// byte for byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceBeautifier;

impl Beautifier for WhitespaceBeautifier {
    fn html(&self, src: &str) -> String {
        if src.contains(HOLE) {
            return normalize_whitespace(src);
        }
        let mut blocks = Vec::new();
        let masked = RAW_BLOCK.replace_all(src, |caps: &regex::Captures<'_>| {
            blocks.push(caps[0].to_string());
            HOLE.to_string()
        });
        let normalized = normalize_whitespace(&masked);
        let mut blocks = blocks.into_iter();
        let mut out = String::with_capacity(src.len());
        for piece in normalized.split_inclusive(HOLE) {
            match piece.strip_suffix(HOLE) {
                Some(text) => {
                    out.push_str(text);
                    out.extend(blocks.next());
                }
                None => out.push_str(piece),
            }
        }
        out
    }

    fn css(&self, src: &str) -> String {
        normalize_whitespace(src)
    }

    fn js(&self, src: &str) -> String {
        normalize_whitespace(src)
    }
}

fn normalize_whitespace(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut pending_blank = false;
    for line in src.lines().map(str::trim_end) {
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push('\n');
            pending_blank = false;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
