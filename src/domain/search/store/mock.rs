//! In-memory search store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::search::traits::{Result, SearchError, SearchStore};
use crate::domain::search::types::{
    CandidateRow, HierarchicalContext, SearchRecord, SearchRequest,
};

/// Mock store backed by a configured candidate list.
///
/// Filters, distance ordering and the expanded limit behave like the real
/// SQL; parent chains and the audit log are plain in-memory maps.
#[derive(Clone, Default)]
pub struct MockSearchStore {
    candidates: Arc<RwLock<Vec<CandidateRow>>>,
    parents: Arc<RwLock<HashMap<i64, HierarchicalContext>>>,
    logged: Arc<RwLock<Vec<SearchRecord>>>,
    fail_fetch: Arc<RwLock<bool>>,
}

impl MockSearchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(self, candidates: Vec<CandidateRow>) -> Self {
        *self.candidates.write().unwrap() = candidates;
        self
    }

    pub fn with_parent_chain(self, chunk_id: i64, context: HierarchicalContext) -> Self {
        self.parents.write().unwrap().insert(chunk_id, context);
        self
    }

    /// Make `fetch_candidates` fail, to exercise error propagation.
    pub fn with_failing_fetch(self) -> Self {
        *self.fail_fetch.write().unwrap() = true;
        self
    }

    /// Audit records written so far.
    pub fn logged(&self) -> Vec<SearchRecord> {
        self.logged.read().unwrap().clone()
    }
}

#[async_trait]
impl SearchStore for MockSearchStore {
    async fn fetch_candidates(
        &self,
        request: &SearchRequest,
        _embedding: &[f32],
        expanded_limit: i64,
    ) -> Result<Vec<CandidateRow>> {
        if *self.fail_fetch.read().unwrap() {
            return Err(SearchError::Database("mock fetch failure".into()));
        }

        let mut rows: Vec<CandidateRow> = self
            .candidates
            .read()
            .unwrap()
            .iter()
            .filter(|row| {
                if let Some(theme) = &request.theme {
                    if row.theme.as_deref() != Some(theme.as_str()) {
                        return false;
                    }
                }
                if let Some(document_type) = &request.document_type {
                    if row.document_type.as_deref() != Some(document_type.as_str()) {
                        return false;
                    }
                }
                if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
                    match row.publish_date {
                        Some(date) if date >= start && date <= end => {}
                        _ => return false,
                    }
                }
                if let Some(level) = request.hierarchy_level {
                    if row.hierarchy_level != level {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let da = a.distance.unwrap_or(f64::INFINITY);
            let db = b.distance.unwrap_or(f64::INFINITY);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        rows.truncate(expanded_limit.max(0) as usize);
        Ok(rows)
    }

    async fn fetch_parent_chain(&self, chunk_id: i64) -> Result<HierarchicalContext> {
        Ok(self
            .parents
            .read()
            .unwrap()
            .get(&chunk_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn log_search(&self, record: &SearchRecord) -> Result<()> {
        self.logged.write().unwrap().push(record.clone());
        Ok(())
    }
}
