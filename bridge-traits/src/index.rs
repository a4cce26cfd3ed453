//! Index Store Abstractions
//!
//! Batched put/remove/get/list operations against the searchable index.
//! Batch calls report success or failure per id; a call-level `Err` means the
//! whole call failed and nothing can be assumed about individual ids.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::document::Document;
use crate::error::Result;

/// Classified reason for a failed index or source operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    NotFound,
    InvalidArgument,
    OutOfSpace,
    Io,
    Internal,
    SourceUnavailable,
    /// Failure without a more specific classification
    Unknown,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::NotFound => "not_found",
            FailureCode::InvalidArgument => "invalid_argument",
            FailureCode::OutOfSpace => "out_of_space",
            FailureCode::Io => "io",
            FailureCode::Internal => "internal",
            FailureCode::SourceUnavailable => "source_unavailable",
            FailureCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single id within a batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFailure {
    pub code: FailureCode,
    pub message: String,
}

impl IndexFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for IndexFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Outcome of one id in a batch call
pub type OpResult = std::result::Result<(), IndexFailure>;

/// Per-id outcomes of a batch call, keyed by document id
pub type BatchResult = HashMap<String, OpResult>;

/// One page of index ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdPage {
    pub ids: Vec<String>,
    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Index store trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::index::IndexClient;
///
/// async fn purge(index: &dyn IndexClient) -> Result<usize> {
///     let ids = index.list_all_ids().await?;
///     let results = index.batch_remove(ids).await?;
///     Ok(results.values().filter(|r| r.is_ok()).count())
/// }
/// ```
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Insert or replace documents.
    async fn batch_put(&self, documents: Vec<Document>) -> Result<BatchResult>;

    /// Remove documents by id. Ids that are not present count as success.
    async fn batch_remove(&self, ids: Vec<String>) -> Result<BatchResult>;

    /// Fetch the requested fields of stored documents.
    ///
    /// The result has one slot per requested id, in the same order; `None`
    /// for ids that are not indexed.
    async fn get_by_id_projected(
        &self,
        ids: &[String],
        fields: &[&'static str],
    ) -> Result<Vec<Option<Document>>>;

    /// Fetch one page of indexed ids. `None` requests the first page.
    async fn list_ids_page(&self, page_token: Option<String>) -> Result<IdPage>;

    /// Every indexed id, following page tokens until exhausted.
    async fn list_all_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut token = None;

        loop {
            let page = self.list_ids_page(token).await?;
            ids.extend(page.ids);

            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }
}

/// Number of successes and failures in a batch result.
pub fn count_outcomes(results: &BatchResult) -> (usize, usize) {
    let succeeded = results.values().filter(|r| r.is_ok()).count();
    (succeeded, results.len() - succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct PagedIndex {
        pages: Vec<Vec<&'static str>>,
        requested: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl IndexClient for PagedIndex {
        async fn batch_put(&self, _documents: Vec<Document>) -> Result<BatchResult> {
            Ok(BatchResult::new())
        }

        async fn batch_remove(&self, _ids: Vec<String>) -> Result<BatchResult> {
            Ok(BatchResult::new())
        }

        async fn get_by_id_projected(
            &self,
            ids: &[String],
            _fields: &[&'static str],
        ) -> Result<Vec<Option<Document>>> {
            Ok(vec![None; ids.len()])
        }

        async fn list_ids_page(&self, page_token: Option<String>) -> Result<IdPage> {
            self.requested.lock().unwrap().push(page_token.clone());
            let index: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let next = index + 1;
            Ok(IdPage {
                ids: self.pages[index].iter().map(|s| s.to_string()).collect(),
                next_page_token: (next < self.pages.len()).then(|| next.to_string()),
            })
        }
    }

    #[core_async::test]
    async fn test_list_all_ids_follows_page_tokens() {
        let index = PagedIndex {
            pages: vec![vec!["a", "b"], vec!["c"], vec!["d", "e"]],
            requested: Mutex::new(Vec::new()),
        };

        let ids = index.list_all_ids().await.unwrap();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(
            *index.requested.lock().unwrap(),
            vec![None, Some("1".to_string()), Some("2".to_string())]
        );
    }

    #[test]
    fn test_count_outcomes() {
        let mut results = BatchResult::new();
        results.insert("a".into(), Ok(()));
        results.insert(
            "b".into(),
            Err(IndexFailure::new(FailureCode::OutOfSpace, "disk full")),
        );
        results.insert("c".into(), Ok(()));

        assert_eq!(count_outcomes(&results), (2, 1));
    }

    #[test]
    fn test_failure_code_ordering_and_display() {
        assert!(FailureCode::NotFound < FailureCode::Unknown);
        assert_eq!(FailureCode::OutOfSpace.to_string(), "out_of_space");
        assert_eq!(
            IndexFailure::new(FailureCode::Io, "short write").to_string(),
            "io: short write"
        );
    }
}
