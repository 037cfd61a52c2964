//! Deterministic next-item selection.

use regex_lite::Regex;
use tracing::{debug, info};

use crate::config::{MediaConfig, NameFilterKind, SourceConfig};
use crate::source::{RemoteCollection, RemoteFile};

use super::types::{CandidateItem, NameFilter, OrderingKey, SelectorError};

/// Picks the next candidate from the source collection.
#[derive(Debug, Clone)]
pub struct ItemSelector {
    source_collection: String,
    filter: NameFilter,
    ordering: Regex,
}

impl ItemSelector {
    /// Create a selector. `ordering_pattern` must capture the sequence number
    /// in its first group.
    pub fn new(
        source_collection: impl Into<String>,
        filter: NameFilter,
        ordering_pattern: &str,
    ) -> Result<Self, SelectorError> {
        let ordering = Regex::new(ordering_pattern).map_err(|e| SelectorError::InvalidPattern {
            pattern: ordering_pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source_collection: source_collection.into(),
            filter,
            ordering,
        })
    }

    /// Build a selector from the source and media configuration.
    pub fn from_config(source: &SourceConfig, media: &MediaConfig) -> Result<Self, SelectorError> {
        let filter = match source.accept {
            NameFilterKind::Extensions => NameFilter::extensions(media.extensions()),
            NameFilterKind::Pattern => NameFilter::pattern(&source.name_pattern)?,
        };
        Self::new(&source.collection_id, filter, &source.ordering_pattern)
    }

    pub fn source_collection(&self) -> &str {
        &self.source_collection
    }

    /// Ordering key embedded in `name`.
    pub fn ordering_key(&self, name: &str) -> OrderingKey {
        self.ordering
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(OrderingKey::Sequence)
            .unwrap_or(OrderingKey::Unordered)
    }

    /// Accepted candidates in publication order.
    ///
    /// The sort is stable, so equal keys keep their listing order.
    pub fn rank(&self, files: Vec<RemoteFile>) -> Vec<CandidateItem> {
        let mut candidates: Vec<CandidateItem> = files
            .into_iter()
            .filter(|file| self.filter.accepts(&file.name))
            .map(|file| CandidateItem {
                ordering_key: self.ordering_key(&file.name),
                id: file.id,
                name: file.name,
                size_hint: file.size,
            })
            .collect();

        candidates.sort_by_key(|c| c.ordering_key);
        candidates
    }

    /// List the source collection and return the next item to publish, or
    /// `None` when nothing is eligible.
    pub async fn select_next(
        &self,
        collection: &dyn RemoteCollection,
    ) -> Result<Option<CandidateItem>, SelectorError> {
        let files = collection.list(&self.source_collection).await?;
        let listed = files.len();

        let ranked = self.rank(files);
        debug!(
            collection = %self.source_collection,
            listed,
            accepted = ranked.len(),
            "Ranked candidates"
        );

        let next = ranked.into_iter().next();
        match &next {
            Some(item) => info!(item_id = %item.id, name = %item.name, "Selected next item"),
            None => info!(
                collection = %self.source_collection,
                "No eligible items in source collection"
            ),
        }
        Ok(next)
    }
}
