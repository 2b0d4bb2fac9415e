//! Title extraction and normalization for document responses.
//!
//! The provider is asked to open a document reply with a `Title:` line. The
//! rules below are tried in priority order; the first label carrying a
//! usable value wins, and that whole line is removed from the outline body.

use std::sync::LazyLock;

use regex::Regex;

/// Idioms that are kept whole even when longer than [`MAX_TITLE_WORDS`].
pub const KNOWN_PHRASES: &[&str] = &[
    "through the looking glass",
    "against the grain",
    "between a rock",
    "smoke and mirrors",
    "out of the blue",
    "against all odds",
    "behind the curtain",
    "down the rabbit hole",
    "into thin air",
    "above the fold",
];

/// Function words kept lowercase except in first or last position.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "for", "nor", "in", "to", "on", "at", "by", "of",
];

pub const MAX_TITLE_WORDS: usize = 3;

/// One labeled title rule.
struct TitleRule {
    label: &'static str,
    pattern: LazyLock<Regex>,
}

macro_rules! title_rule {
    ($label:literal) => {
        TitleRule {
            label: $label,
            pattern: LazyLock::new(|| {
                Regex::new(concat!(r"(?im)^[^\n]*?\b", $label, r":([^\n]*)(?:\n|$)"))
                    .expect("Invalid title regex")
            }),
        }
    };
}

static TITLE_RULES: [TitleRule; 4] = [
    title_rule!("Suggested Title"),
    title_rule!("Title"),
    title_rule!("Proposed Title"),
    title_rule!("Document Title"),
];

/// Outcome of scanning a response for a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleMatch {
    /// A title was found; `remainder` is the text with the title line removed.
    Found { title: String, remainder: String },
    NotFound,
}

impl TitleMatch {
    /// Split into `(outline, suggested_title)`, using `original` when no
    /// title was found.
    pub fn into_parts(self, original: &str) -> (String, Option<String>) {
        match self {
            Self::Found { title, remainder } => (remainder, Some(title)),
            Self::NotFound => (original.to_string(), None),
        }
    }
}

/// Scan `text` for a title declaration.
pub fn extract_title(text: &str) -> TitleMatch {
    for rule in &TITLE_RULES {
        for caps in rule.pattern.captures_iter(text) {
            let (Some(line), Some(value)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let title = normalize_title(value.as_str());
            if title.is_empty() {
                continue;
            }

            tracing::debug!(label = rule.label, title = %title, "Extracted title");

            let mut remainder = String::with_capacity(text.len());
            remainder.push_str(&text[..line.start()]);
            remainder.push_str(&text[line.end()..]);
            return TitleMatch::Found {
                title,
                remainder: remainder.trim().to_string(),
            };
        }
    }
    TitleMatch::NotFound
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

fn is_edge_noise(c: char) -> bool {
    is_quote(c) || c == '*' || c == '_' || c.is_whitespace()
}

/// Uppercase the first letter and lowercase the rest; leading punctuation
/// is kept as is.
fn capitalize(word: &str) -> String {
    let mut seen_letter = false;
    word.chars()
        .flat_map(|c| {
            let upper = c.is_alphabetic() && !seen_letter;
            seen_letter |= c.is_alphabetic();
            let mapped: Vec<char> = if upper {
                c.to_uppercase().collect()
            } else {
                c.to_lowercase().collect()
            };
            mapped
        })
        .collect()
}

/// Normalize a raw provider title.
///
/// Strips quotes and markdown emphasis, folds all-caps input, limits the
/// title to [`MAX_TITLE_WORDS`] words unless it contains a known idiom, then
/// applies title case. Normalizing an already-normalized title is a no-op.
pub fn normalize_title(raw: &str) -> String {
    let unquoted: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\u{201C}' | '\u{201D}'))
        .collect();
    let mut title = unquoted.trim_matches(is_edge_noise).to_string();

    if title.chars().any(char::is_alphabetic) && title == title.to_uppercase() {
        title = title.to_lowercase();
    }

    let mut words: Vec<&str> = title.split_whitespace().collect();
    if words.len() > MAX_TITLE_WORDS {
        let lower = words.join(" ").to_lowercase();
        if !KNOWN_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
            words.truncate(MAX_TITLE_WORDS);
        }
    }

    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i != 0 && i != last && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
