use std::collections::HashSet;

use serde_json::Value;

use crate::platform::{Document, ResourceType, normalize};

/// Documents collected during one pull, unique by id. The first occurrence
/// wins.
#[derive(Debug, Default)]
pub(super) struct Batch {
    documents: Vec<Document>,
    seen: HashSet<String>,
}

impl Batch {
    /// Normalize and add raw items; returns how many were new.
    pub(super) fn extend(&mut self, resource: ResourceType, items: Vec<Value>) -> usize {
        let before = self.documents.len();
        for raw in items {
            let document = normalize(resource, &raw);
            if self.seen.insert(document.id.clone()) {
                self.documents.push(document);
            } else {
                tracing::debug!(id = %document.id, "dropping duplicate document");
            }
        }
        self.documents.len() - before
    }

    pub(super) fn len(&self) -> usize {
        self.documents.len()
    }

    pub(super) fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicates_keep_first() {
        let mut batch = Batch::default();
        let added = batch.extend(
            ResourceType::Issue,
            vec![
                json!({"id": 1, "title": "first"}),
                json!({"id": 1, "title": "second"}),
                json!({"id": 2, "title": "other"}),
            ],
        );
        assert_eq!(added, 2);
        assert_eq!(batch.len(), 2);

        let again = batch.extend(ResourceType::Issue, vec![json!({"id": 2})]);
        assert_eq!(again, 0);

        let documents = batch.into_documents();
        assert_eq!(documents[0].title, "first");
    }

    #[test]
    fn test_same_raw_id_in_different_types_is_kept() {
        let mut batch = Batch::default();
        batch.extend(ResourceType::Issue, vec![json!({"id": 7})]);
        batch.extend(ResourceType::Release, vec![json!({"id": 7})]);
        assert_eq!(batch.len(), 2);
    }
}
