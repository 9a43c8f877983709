//! Declarative element selectors.
//!
//! A selector describes how to find exactly one element on a live page. The
//! resolver enforces the cardinality: zero matches and multiple matches are
//! both failures, never a silent "first match".

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a text selector compares against an element's rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Full equality of the normalized rendered text.
    Exact,
    /// Substring containment.
    #[default]
    Partial,
}

impl MatchMode {
    /// Compare a candidate element's rendered text against the wanted text.
    ///
    /// Both sides are whitespace-normalized first, matching how browsers
    /// render runs of whitespace.
    pub fn matches(&self, rendered: &str, wanted: &str) -> bool {
        let rendered = normalize_text(rendered);
        let wanted = normalize_text(wanted);
        match self {
            MatchMode::Exact => rendered == wanted,
            MatchMode::Partial => !rendered.is_empty() && rendered.contains(&wanted),
        }
    }
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A lookup by rendered text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextQuery {
    pub text: String,
    #[serde(default, rename = "match")]
    pub match_mode: MatchMode,
}

impl TextQuery {
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            match_mode: MatchMode::Exact,
        }
    }

    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            match_mode: MatchMode::Partial,
        }
    }
}

/// A lookup by native query expression: CSS, or XPath when the expression
/// carries an `xpath=` prefix or starts with `/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorQuery {
    pub expression: String,
}

impl LocatorQuery {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementSelector {
    Text(TextQuery),
    Locator(LocatorQuery),
    /// Scoped text lookup: the locator narrows the search scope, the text
    /// query resolves inside that scope.
    Complex {
        locator: LocatorQuery,
        text: TextQuery,
    },
}

impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementSelector::Text(query) => {
                let op = match query.match_mode {
                    MatchMode::Exact => "=",
                    MatchMode::Partial => "~",
                };
                write!(f, "text {op} \"{}\"", query.text)
            }
            ElementSelector::Locator(query) => write!(f, "locator \"{}\"", query.expression),
            ElementSelector::Complex { locator, text } => {
                write!(f, "locator \"{}\" >> text \"{}\"", locator.expression, text.text)
            }
        }
    }
}
