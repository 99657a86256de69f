//! Heuristic eligibility check for document text nodes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Shorter trimmed texts are skipped.
const MIN_CHARS: usize = 3;
/// Han share above which text counts as already translated.
const HAN_RATIO_LIMIT: f64 = 0.8;

static NON_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s\W]+$").unwrap());

/// Whether `text` is worth sending for translation.
pub fn should_translate(text: &str) -> bool {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total < MIN_CHARS {
        return false;
    }
    if NON_WORDS.is_match(trimmed) {
        return false;
    }
    let han = trimmed.chars().filter(|c| is_han(*c)).count();
    (han as f64 / total as f64) <= HAN_RATIO_LIMIT
}

fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}
