//! Content-hash deduplication against a collection.

use crate::metadata::HASH_KEY;
use crate::store::{with_timeout, Filter, VectorStore, DEFAULT_STORE_TIMEOUT};
use docindex_core::AppResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How a multi-hash lookup decides which documents are duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchDuplicatePolicy {
    /// Any stored match for any hash marks the whole batch as duplicate
    #[default]
    AnyMatch,
    /// A document is a duplicate only if its own hash is stored
    PerHash,
}

/// Checks content hashes against what a collection already holds.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    store: Arc<dyn VectorStore>,
    policy: BatchDuplicatePolicy,
    timeout: Duration,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn VectorStore>, policy: BatchDuplicatePolicy) -> Self {
        Self {
            store,
            policy,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Deadline for each hash lookup.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> BatchDuplicatePolicy {
        self.policy
    }

    /// Whether any item of `collection` carries `content_hash`.
    pub async fn check_duplicate(&self, collection: &str, content_hash: &str) -> AppResult<bool> {
        let filter = Filter::eq(HASH_KEY, content_hash);
        let result = with_timeout(
            &format!("duplicate lookup in '{}'", collection),
            self.timeout,
            self.store.query(collection, &filter, Some(1)),
        )
        .await?;
        Ok(result.has_matches())
    }

    /// Duplicate flags aligned with `hashes`, resolved with a single store query.
    pub async fn find_duplicates(
        &self,
        collection: &str,
        hashes: &[String],
    ) -> AppResult<Vec<bool>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::one_of(HASH_KEY, hashes.iter().cloned());
        let limit = match self.policy {
            BatchDuplicatePolicy::AnyMatch => Some(1),
            BatchDuplicatePolicy::PerHash => None,
        };
        let result = with_timeout(
            &format!("duplicate lookup in '{}'", collection),
            self.timeout,
            self.store.query(collection, &filter, limit),
        )
        .await?;

        let flags = match self.policy {
            BatchDuplicatePolicy::AnyMatch => vec![result.has_matches(); hashes.len()],
            BatchDuplicatePolicy::PerHash => {
                let stored: HashSet<&str> = result
                    .metadatas
                    .iter()
                    .flatten()
                    .filter_map(|m| m.get(HASH_KEY).and_then(|v| v.as_str()))
                    .collect();
                hashes.iter().map(|h| stored.contains(h.as_str())).collect()
            }
        };

        tracing::debug!(
            "Duplicate lookup in '{}' ({:?}): {} of {} hashes flagged",
            collection,
            self.policy,
            flags.iter().filter(|f| **f).count(),
            hashes.len()
        );

        Ok(flags)
    }
}
