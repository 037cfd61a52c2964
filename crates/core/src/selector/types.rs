//! Types for candidate selection.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur while selecting the next candidate.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// A configured pattern does not compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The source collection could not be listed.
    #[error("failed to list source collection: {0}")]
    Source(#[from] SourceError),
}

/// Position of a candidate in the publication queue.
///
/// Variant order matters: every `Sequence` sorts before `Unordered`, so names
/// without a parsable number always go last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingKey {
    Sequence(u64),
    Unordered,
}

/// A file awaiting publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Remote identifier; the item's identity.
    pub id: String,
    /// Original file name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
    pub ordering_key: OrderingKey,
}

/// Which names count as candidates.
#[derive(Debug, Clone)]
pub enum NameFilter {
    /// Case-insensitive extension allow-list (without the dot).
    Extensions(Vec<String>),
    /// Names matching the expression.
    Pattern(Regex),
}

impl NameFilter {
    pub fn pattern(pattern: &str) -> Result<Self, SelectorError> {
        Regex::new(pattern)
            .map(NameFilter::Pattern)
            .map_err(|e| SelectorError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameFilter::Extensions(extensions.into_iter().map(Into::into).collect())
    }

    pub fn accepts(&self, name: &str) -> bool {
        match self {
            NameFilter::Extensions(extensions) => name
                .rsplit_once('.')
                .map(|(_, ext)| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                .unwrap_or(false),
            NameFilter::Pattern(regex) => regex.is_match(name),
        }
    }
}
