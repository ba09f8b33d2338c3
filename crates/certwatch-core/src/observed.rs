//! Entries captured from a rendered catalog at one poll sample.

use std::collections::HashSet;

use crate::registry::is_noise;

/// Deduplicated, noise-free titles in first-seen order.
///
/// Whitespace runs are collapsed so that `innerText` line breaks do not
/// produce distinct entries for the same title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedEntrySet {
    entries: Vec<String>,
}

impl ObservedEntrySet {
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for text in raw {
            let text = collapse_whitespace(text.as_ref());
            if text.is_empty() || is_noise(&text) {
                continue;
            }
            if seen.insert(text.clone()) {
                entries.push(text);
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
