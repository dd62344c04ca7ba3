//! Vocabulary highlighter
//!
//! Splits sentence text into plain runs and vocabulary spans.
//!
//! - Matching is case-insensitive and literal (entries are regex-escaped).
//! - An entry that starts or ends with an ASCII word character only matches
//!   at an ASCII word boundary on that side, so "app" does not match inside
//!   "apple" while "apple" still matches right after CJK text ("我喜欢apple").
//! - Longer entries are tried first; equal lengths keep their listed order.
//! - Blank entries are ignored.

use regex::{Regex, RegexBuilder};
use tracing::warn;
use ysr_common::VocabularyItem;

/// Size limit for the compiled alternation
const REGEX_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// One render fragment, borrowing from the input text and vocabulary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fragment<'a> {
    Text(&'a str),
    Vocabulary {
        /// Matched text as written in the sentence
        text: &'a str,
        item: &'a VocabularyItem,
    },
}

impl<'a> Fragment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Fragment::Text(text) => text,
            Fragment::Vocabulary { text, .. } => text,
        }
    }
}

/// Compiled matcher for one vocabulary list
pub struct Highlighter<'v> {
    /// Entries in match priority order; group `i + 1` belongs to `entries[i]`
    entries: Vec<&'v VocabularyItem>,
    pattern: Option<Regex>,
}

impl<'v> Highlighter<'v> {
    pub fn new(vocabulary: &'v [VocabularyItem]) -> Self {
        let mut entries: Vec<&VocabularyItem> = vocabulary
            .iter()
            .filter(|item| !item.word.trim().is_empty())
            .collect();

        // Stable: equal lengths keep their listed order
        entries.sort_by(|a, b| {
            b.word
                .trim()
                .chars()
                .count()
                .cmp(&a.word.trim().chars().count())
        });

        if entries.is_empty() {
            return Self {
                entries,
                pattern: None,
            };
        }

        let alternation = entries
            .iter()
            .map(|item| format!("({})", entry_pattern(item.word.trim())))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = match RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("Vocabulary pattern failed to compile, highlighting disabled: {}", e);
                None
            }
        };

        Self { entries, pattern }
    }

    /// Fragments of `text` in original order
    pub fn highlight<'t>(&self, text: &'t str) -> Vec<Fragment<'t>>
    where
        'v: 't,
    {
        let pattern = match &self.pattern {
            Some(pattern) => pattern,
            None => return vec![Fragment::Text(text)],
        };

        let mut fragments = Vec::new();
        let mut last = 0;

        for caps in pattern.captures_iter(text) {
            let whole = match caps.get(0) {
                Some(m) if !m.is_empty() => m,
                _ => continue,
            };
            let item = (1..caps.len())
                .find(|&i| caps.get(i).is_some())
                .and_then(|i| self.entries.get(i - 1));
            let item = match item {
                Some(item) => *item,
                None => continue,
            };

            if whole.start() > last {
                fragments.push(Fragment::Text(&text[last..whole.start()]));
            }
            fragments.push(Fragment::Vocabulary {
                text: whole.as_str(),
                item,
            });
            last = whole.end();
        }

        if fragments.is_empty() {
            return vec![Fragment::Text(text)];
        }
        if last < text.len() {
            fragments.push(Fragment::Text(&text[last..]));
        }
        fragments
    }
}

/// Highlight `text` against `vocabulary` in one call
pub fn highlight<'a>(text: &'a str, vocabulary: &'a [VocabularyItem]) -> Vec<Fragment<'a>> {
    Highlighter::new(vocabulary).highlight(text)
}

fn entry_pattern(word: &str) -> String {
    let mut pattern = String::new();
    if word.chars().next().map(is_word_char).unwrap_or(false) {
        pattern.push_str(ASCII_BOUNDARY);
    }
    pattern.push_str(&regex::escape(word));
    if word.chars().last().map(is_word_char).unwrap_or(false) {
        pattern.push_str(ASCII_BOUNDARY);
    }
    pattern
}

/// Unicode `\b` counts CJK ideographs as word characters
const ASCII_BOUNDARY: &str = r"(?-u:\b)";

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
