//! In-memory Index Client
//!
//! A complete `IndexClient` over a sorted map. Useful as a local index for
//! small corpora and as the index in end-to-end tests, which is why it can
//! also inject failures and records the calls it receives.

use async_trait::async_trait;
use bridge_traits::{
    document::Document,
    error::{BridgeError, Result},
    index::{BatchResult, FailureCode, IdPage, IndexClient, IndexFailure},
};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Default)]
struct State {
    documents: BTreeMap<String, Document>,
    put_failures: HashMap<String, FailureCode>,
    fail_next_call: Option<FailureCode>,
    put_calls: Vec<Vec<String>>,
    remove_calls: Vec<Vec<String>>,
}

impl State {
    fn take_call_failure(&mut self, operation: &str) -> Result<()> {
        match self.fail_next_call.take() {
            Some(code) => Err(BridgeError::Index {
                code,
                message: format!("injected {} failure", operation),
            }),
            None => Ok(()),
        }
    }
}

/// Index held in memory, ordered by id
pub struct MemoryIndex {
    state: Mutex<State>,
    page_size: usize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Index whose id listing pages hold at most `page_size` ids.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a document directly, bypassing call recording.
    pub fn insert(&self, document: Document) {
        self.state().documents.insert(document.id.clone(), document);
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.state().documents.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.state().documents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every future put of `id` fail with `code`.
    pub fn fail_put(&self, id: impl Into<String>, code: FailureCode) {
        self.state().put_failures.insert(id.into(), code);
    }

    /// Make the next put or remove call fail as a whole.
    pub fn fail_next_call(&self, code: FailureCode) {
        self.state().fail_next_call = Some(code);
    }

    /// Ids of every successful `batch_put` call, one entry per call.
    pub fn put_calls(&self) -> Vec<Vec<String>> {
        self.state().put_calls.clone()
    }

    /// Ids of every successful `batch_remove` call, one entry per call.
    pub fn remove_calls(&self) -> Vec<Vec<String>> {
        self.state().remove_calls.clone()
    }

    /// Whether any recorded put call contained `id`.
    pub fn was_put(&self, id: &str) -> bool {
        self.state()
            .put_calls
            .iter()
            .any(|call| call.iter().any(|put| put == id))
    }

    pub fn clear_calls(&self) {
        let mut state = self.state();
        state.put_calls.clear();
        state.remove_calls.clear();
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexClient for MemoryIndex {
    async fn batch_put(&self, documents: Vec<Document>) -> Result<BatchResult> {
        let mut state = self.state();
        state.take_call_failure("put")?;

        let mut results = BatchResult::with_capacity(documents.len());
        let mut call = Vec::with_capacity(documents.len());

        for document in documents {
            call.push(document.id.clone());
            if let Some(code) = state.put_failures.get(&document.id).copied() {
                results.insert(
                    document.id.clone(),
                    Err(IndexFailure::new(code, "injected put failure")),
                );
                continue;
            }
            results.insert(document.id.clone(), Ok(()));
            state.documents.insert(document.id.clone(), document);
        }

        debug!(count = call.len(), "Put documents");
        state.put_calls.push(call);
        Ok(results)
    }

    async fn batch_remove(&self, ids: Vec<String>) -> Result<BatchResult> {
        let mut state = self.state();
        state.take_call_failure("remove")?;

        let mut results = BatchResult::with_capacity(ids.len());
        for id in &ids {
            state.documents.remove(id);
            results.insert(id.clone(), Ok(()));
        }

        debug!(count = ids.len(), "Removed documents");
        state.remove_calls.push(ids);
        Ok(results)
    }

    async fn get_by_id_projected(
        &self,
        ids: &[String],
        fields: &[&'static str],
    ) -> Result<Vec<Option<Document>>> {
        let state = self.state();
        Ok(ids
            .iter()
            .map(|id| state.documents.get(id).map(|doc| doc.projected(fields)))
            .collect())
    }

    async fn list_ids_page(&self, page_token: Option<String>) -> Result<IdPage> {
        let state = self.state();
        let lower = match page_token {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };

        let mut ids: Vec<String> = state
            .documents
            .range((lower, Bound::Unbounded))
            .map(|(id, _)| id.clone())
            .take(self.page_size + 1)
            .collect();

        let next_page_token = if ids.len() > self.page_size {
            ids.truncate(self.page_size);
            ids.last().cloned()
        } else {
            None
        };

        Ok(IdPage {
            ids,
            next_page_token,
        })
    }
}
