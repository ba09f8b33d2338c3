//! Fuzzy set comparison between rendered and expected catalog entries.
//!
//! Equivalence between an actual entry A and an expected title E holds when
//! any rule in [`MatchRule`] fires, tried in declaration order. Substring
//! containment runs in both directions so code prefixes, truncation and
//! punctuation drift between environments do not need canonicalizing.

use serde::{Deserialize, Serialize};

use crate::observed::ObservedEntrySet;
use crate::registry::ExpectedEntry;

/// Which tolerance rule made two strings equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    CaseInsensitive,
    /// A contains E, ignoring case.
    ActualContainsExpected,
    /// E contains A, ignoring case.
    ExpectedContainsActual,
    /// Containment after stripping punctuation and collapsing whitespace.
    Normalized,
}

/// String equivalence used by [`diff_entries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyMatcher {
    normalize_punctuation: bool,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::normalized()
    }
}

impl FuzzyMatcher {
    /// Exact, case-insensitive and two-way substring rules only.
    pub fn strict() -> Self {
        Self {
            normalize_punctuation: false,
        }
    }

    /// Strict rules plus the punctuation-insensitive containment tier.
    pub fn normalized() -> Self {
        Self {
            normalize_punctuation: true,
        }
    }

    pub fn match_rule(&self, actual: &str, expected: &str) -> Option<MatchRule> {
        if actual.is_empty() || expected.is_empty() {
            return None;
        }
        if actual == expected {
            return Some(MatchRule::Exact);
        }

        let a = actual.to_lowercase();
        let e = expected.to_lowercase();
        if a == e {
            return Some(MatchRule::CaseInsensitive);
        }
        if a.contains(&e) {
            return Some(MatchRule::ActualContainsExpected);
        }
        if e.contains(&a) {
            return Some(MatchRule::ExpectedContainsActual);
        }

        if self.normalize_punctuation {
            let (na, ne) = (normalize(actual), normalize(expected));
            if !na.is_empty() && !ne.is_empty() && (na.contains(&ne) || ne.contains(&na)) {
                return Some(MatchRule::Normalized);
            }
        }
        None
    }

    pub fn is_match(&self, actual: &str, expected: &str) -> bool {
        self.match_rule(actual, expected).is_some()
    }
}

/// Lowercase alphanumerics, with every run of other characters folded to one space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// An expected entry that some rendered entry satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matched {
    pub expected: String,
    /// First rendered entry that matched, in its displayed form.
    pub observed: String,
    pub rule: MatchRule,
}

/// An expected entry nothing rendered matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Missing {
    pub expected: String,
}

/// Outcome of checking one expected entry.
pub type EntryCheck = Result<Matched, Missing>;

/// Result of comparing rendered entries with the expected catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub actual: Vec<String>,
    /// Expected titles with no equivalent rendered entry.
    pub missing: Vec<String>,
    /// Rendered entries with no equivalent expected title.
    pub extra: Vec<String>,
    /// One check per expected entry, in expected order.
    pub checks: Vec<EntryCheck>,
}

impl DiffResult {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }

    pub fn matched(&self) -> impl Iterator<Item = &Matched> {
        self.checks.iter().filter_map(|c| c.as_ref().ok())
    }
}

/// Classify `actual` against `expected`.
///
/// Every expected entry is checked before anything is decided, so a single
/// diff reports all missing entries at once.
pub fn diff_entries(
    actual: &ObservedEntrySet,
    expected: &[ExpectedEntry],
    matcher: FuzzyMatcher,
) -> DiffResult {
    let checks: Vec<EntryCheck> = expected
        .iter()
        .map(|entry| {
            actual
                .iter()
                .find_map(|a| {
                    matcher.match_rule(a, &entry.title).map(|rule| Matched {
                        expected: entry.title.clone(),
                        observed: a.to_string(),
                        rule,
                    })
                })
                .ok_or_else(|| Missing {
                    expected: entry.title.clone(),
                })
        })
        .collect();

    let mut missing: Vec<String> = Vec::new();
    for check in &checks {
        if let Err(m) = check {
            if !missing.contains(&m.expected) {
                missing.push(m.expected.clone());
            }
        }
    }

    let extra = actual
        .iter()
        .filter(|a| !expected.iter().any(|e| matcher.is_match(a, &e.title)))
        .map(str::to_string)
        .collect();

    DiffResult {
        actual: actual.as_slice().to_vec(),
        missing,
        extra,
        checks,
    }
}
