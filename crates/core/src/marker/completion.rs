//! Completion marker implementation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{CompletionPolicy, SourceConfig};
use crate::selector::CandidateItem;
use crate::source::{RemoteCollection, SourceError};

use super::types::{Completion, ConsumptionError, ConsumptionOutcome};

/// Removes published items from the source collection.
pub struct CompletionMarker {
    collection: Arc<dyn RemoteCollection>,
    source_collection: String,
    completion: Completion,
}

impl CompletionMarker {
    pub fn new(
        collection: Arc<dyn RemoteCollection>,
        source_collection: impl Into<String>,
        completion: Completion,
    ) -> Self {
        Self {
            collection,
            source_collection: source_collection.into(),
            completion,
        }
    }

    /// Build a marker from the source configuration.
    pub fn from_config(
        source: &SourceConfig,
        collection: Arc<dyn RemoteCollection>,
    ) -> Result<Self, ConsumptionError> {
        let completion = match source.completion {
            CompletionPolicy::Delete => Completion::Delete,
            CompletionPolicy::Relocate => {
                let consumed_collection = source
                    .consumed_collection_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        ConsumptionError::Misconfigured(
                            "relocate policy requires consumed_collection_id".to_string(),
                        )
                    })?;
                Completion::Relocate {
                    consumed_collection,
                    delete_on_failure: source.delete_if_relocation_fails,
                }
            }
        };

        Ok(Self::new(collection, &source.collection_id, completion))
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Take `item` out of the source collection.
    ///
    /// Safe to call again for the same item: an item that is gone, or no
    /// longer inside the source collection, is reported as
    /// [`ConsumptionOutcome::AlreadyConsumed`].
    pub async fn mark_consumed(
        &self,
        item: &CandidateItem,
    ) -> Result<ConsumptionOutcome, ConsumptionError> {
        let parents = match self.collection.parents(&item.id).await {
            Ok(Some(parents)) => parents,
            Ok(None) => return Ok(self.already_consumed(item)),
            Err(e) if e.is_not_found() => return Ok(self.already_consumed(item)),
            Err(source) => {
                return Err(ConsumptionError::Lookup {
                    item_id: item.id.clone(),
                    source,
                })
            }
        };

        if !parents.iter().any(|p| p == &self.source_collection) {
            return Ok(self.already_consumed(item));
        }

        let outcome = match &self.completion {
            Completion::Delete => self.delete(item).await?,
            Completion::Relocate {
                consumed_collection,
                delete_on_failure,
            } => match self.relocate(item, consumed_collection, &parents).await {
                Ok(outcome) => outcome,
                Err(source) if *delete_on_failure => {
                    warn!(
                        item_id = %item.id,
                        error = %source,
                        "Relocation failed, deleting item instead"
                    );
                    self.delete(item).await?
                }
                Err(source) => {
                    return Err(ConsumptionError::Relocate {
                        item_id: item.id.clone(),
                        target: consumed_collection.clone(),
                        source,
                    })
                }
            },
        };

        info!(item_id = %item.id, outcome = outcome.as_str(), "Item marked as consumed");
        Ok(outcome)
    }

    fn already_consumed(&self, item: &CandidateItem) -> ConsumptionOutcome {
        info!(
            item_id = %item.id,
            collection = %self.source_collection,
            "Item already absent from source collection"
        );
        ConsumptionOutcome::AlreadyConsumed
    }

    /// Add the consumed parent (unless a previous attempt already did), then
    /// drop the source parent.
    async fn relocate(
        &self,
        item: &CandidateItem,
        consumed_collection: &str,
        parents: &[String],
    ) -> Result<ConsumptionOutcome, SourceError> {
        if parents.iter().any(|p| p == consumed_collection) {
            debug!(item_id = %item.id, "Consumed parent already present");
        } else {
            match self
                .collection
                .update_parents(&item.id, Some(consumed_collection), None)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => return Ok(ConsumptionOutcome::AlreadyConsumed),
                Err(e) => return Err(e),
            }
        }

        match self
            .collection
            .update_parents(&item.id, None, Some(&self.source_collection))
            .await
        {
            Ok(()) => Ok(ConsumptionOutcome::Relocated),
            Err(e) if e.is_not_found() => Ok(ConsumptionOutcome::AlreadyConsumed),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, item: &CandidateItem) -> Result<ConsumptionOutcome, ConsumptionError> {
        match self.collection.delete(&item.id).await {
            Ok(()) => Ok(ConsumptionOutcome::Deleted),
            Err(e) if e.is_not_found() => Ok(ConsumptionOutcome::AlreadyConsumed),
            Err(source) => Err(ConsumptionError::Delete {
                item_id: item.id.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, CollectionCall, MockRemoteCollection};
    use tokio_test::{assert_err, assert_ok};

    async fn collection_with_clip() -> Arc<MockRemoteCollection> {
        let collection = Arc::new(MockRemoteCollection::new());
        collection.add_file("f1", "clip_1.mp4", "src", b"bytes").await;
        collection
    }

    fn relocating(
        collection: &Arc<MockRemoteCollection>,
        delete_on_failure: bool,
    ) -> CompletionMarker {
        CompletionMarker::new(
            Arc::clone(collection) as Arc<dyn RemoteCollection>,
            "src",
            Completion::Relocate {
                consumed_collection: "posted".to_string(),
                delete_on_failure,
            },
        )
    }

    fn deleting(collection: &Arc<MockRemoteCollection>) -> CompletionMarker {
        CompletionMarker::new(
            Arc::clone(collection) as Arc<dyn RemoteCollection>,
            "src",
            Completion::Delete,
        )
    }

    fn update_calls(calls: &[CollectionCall]) -> usize {
        calls
            .iter()
            .filter(|c| matches!(c, CollectionCall::UpdateParents { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_relocate_adds_then_removes() {
        let collection = collection_with_clip().await;
        let marker = relocating(&collection, false);

        let outcome = marker
            .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap();

        assert_eq!(outcome, ConsumptionOutcome::Relocated);
        assert!(collection.files_in("src").await.is_empty());
        assert_eq!(collection.files_in("posted").await, vec!["f1"]);
        assert_eq!(
            collection.calls().await,
            vec![
                CollectionCall::Parents("f1".to_string()),
                CollectionCall::UpdateParents {
                    file_id: "f1".to_string(),
                    add: Some("posted".to_string()),
                    remove: None,
                },
                CollectionCall::UpdateParents {
                    file_id: "f1".to_string(),
                    add: None,
                    remove: Some("src".to_string()),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_mark_consumed_twice_succeeds_both_times() {
        let collection = collection_with_clip().await;
        let marker = relocating(&collection, false);
        let item = fixtures::candidate("f1", "clip_1.mp4");

        let first = assert_ok!(marker.mark_consumed(&item).await);
        let second = assert_ok!(marker.mark_consumed(&item).await);

        assert_eq!(first, ConsumptionOutcome::Relocated);
        assert_eq!(second, ConsumptionOutcome::AlreadyConsumed);
        assert_eq!(update_calls(&collection.calls().await), 2);
    }

    #[tokio::test]
    async fn test_delete_twice_succeeds_both_times() {
        let collection = collection_with_clip().await;
        let marker = deleting(&collection);
        let item = fixtures::candidate("f1", "clip_1.mp4");

        assert_eq!(
            assert_ok!(marker.mark_consumed(&item).await),
            ConsumptionOutcome::Deleted
        );
        assert_eq!(
            assert_ok!(marker.mark_consumed(&item).await),
            ConsumptionOutcome::AlreadyConsumed
        );
        assert!(!collection.contains("f1").await);
    }

    #[tokio::test]
    async fn test_partial_relocation_only_removes_source_parent() {
        let collection = collection_with_clip().await;
        collection
            .update_parents("f1", Some("posted"), None)
            .await
            .unwrap();
        collection.clear_calls().await;

        let outcome = relocating(&collection, false)
            .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap();

        assert_eq!(outcome, ConsumptionOutcome::Relocated);
        let calls = collection.calls().await;
        assert_eq!(update_calls(&calls), 1);
        assert!(calls.contains(&CollectionCall::UpdateParents {
            file_id: "f1".to_string(),
            add: None,
            remove: Some("src".to_string()),
        }));
    }

    #[tokio::test]
    async fn test_missing_item_is_already_consumed() {
        let collection = Arc::new(MockRemoteCollection::new());
        let outcome = relocating(&collection, false)
            .mark_consumed(&fixtures::candidate("gone", "clip_1.mp4"))
            .await
            .unwrap();

        assert_eq!(outcome, ConsumptionOutcome::AlreadyConsumed);
        assert_eq!(update_calls(&collection.calls().await), 0);
    }

    #[tokio::test]
    async fn test_not_found_during_update_is_already_consumed() {
        let collection = collection_with_clip().await;
        collection
            .fail_next_update(SourceError::NotFound("f1".into()))
            .await;

        let outcome = relocating(&collection, false)
            .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap();
        assert_eq!(outcome, ConsumptionOutcome::AlreadyConsumed);
    }

    #[tokio::test]
    async fn test_relocation_failure_without_fallback() {
        let collection = collection_with_clip().await;
        collection
            .fail_next_update(SourceError::ApiError("HTTP 500".into()))
            .await;

        let err = assert_err!(
            relocating(&collection, false)
                .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
                .await
        );

        assert!(matches!(err, ConsumptionError::Relocate { ref target, .. } if target == "posted"));
        assert_eq!(collection.files_in("src").await, vec!["f1"]);
    }

    #[tokio::test]
    async fn test_relocation_failure_falls_back_to_delete() {
        let collection = collection_with_clip().await;
        collection
            .fail_next_update(SourceError::ApiError("HTTP 500".into()))
            .await;

        let outcome = relocating(&collection, true)
            .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap();

        assert_eq!(outcome, ConsumptionOutcome::Deleted);
        assert!(!collection.contains("f1").await);
    }

    #[tokio::test]
    async fn test_relocation_and_delete_both_fail() {
        let collection = collection_with_clip().await;
        collection
            .fail_next_update(SourceError::ApiError("HTTP 500".into()))
            .await;
        collection
            .fail_next_delete(SourceError::ApiError("HTTP 403".into()))
            .await;

        let err = relocating(&collection, true)
            .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConsumptionError::Delete { .. }));
        assert!(collection.contains("f1").await);
    }

    #[tokio::test]
    async fn test_lookup_failure() {
        let collection = collection_with_clip().await;
        collection.fail_next_parents(SourceError::Timeout).await;

        let err = deleting(&collection)
            .mark_consumed(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConsumptionError::Lookup { .. }));
        assert!(collection.contains("f1").await);
    }

    #[test]
    fn test_from_config_requires_consumed_collection() {
        let source: SourceConfig = toml::from_str(r#"collection_id = "src""#).unwrap();
        let collection = Arc::new(MockRemoteCollection::new()) as Arc<dyn RemoteCollection>;

        let result = CompletionMarker::from_config(&source, collection);
        assert!(matches!(result, Err(ConsumptionError::Misconfigured(_))));
    }

    #[test]
    fn test_from_config_delete_policy() {
        let source: SourceConfig = toml::from_str(
            r#"
collection_id = "src"
completion = "delete"
"#,
        )
        .unwrap();
        let collection = Arc::new(MockRemoteCollection::new()) as Arc<dyn RemoteCollection>;

        let marker = CompletionMarker::from_config(&source, collection).unwrap();
        assert_eq!(marker.completion(), &Completion::Delete);
    }
}
