//! Sentence-aware splitting of long text into bounded segments.
//! Lengths are counted in chars.

use once_cell::sync::Lazy;
use regex::Regex;

/// A sentence: anything up to a run of terminators, plus trailing whitespace.
static SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?。！？]*[.!?。！？]+\s*").unwrap());

/// Split `text` into segments of at most `max_len` chars.
///
/// Sentences are packed greedily; a sentence longer than `max_len` is cut at
/// `max_len`-char boundaries and its remainder opens the next segment.
/// Concatenating the result always yields `text` again.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences(text) {
        let len = sentence.chars().count();
        if current_len + len <= max_len {
            current.push_str(sentence);
            current_len += len;
            continue;
        }

        if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if len <= max_len {
            current.push_str(sentence);
            current_len = len;
            continue;
        }

        let chars: Vec<char> = sentence.chars().collect();
        let mut pieces = chars.chunks(max_len).peekable();
        while let Some(piece) = pieces.next() {
            if pieces.peek().is_some() {
                segments.push(piece.iter().collect());
            } else {
                current = piece.iter().collect();
                current_len = piece.len();
            }
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Sentences in order; text after the last terminator is one final sentence.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut end = 0;
    for found in SENTENCE.find_iter(text) {
        if found.start() > end {
            out.push(&text[end..found.start()]);
        }
        out.push(found.as_str());
        end = found.end();
    }
    if end < text.len() {
        out.push(&text[end..]);
    }
    out
}
