//! Search backend abstraction.
//!
//! Tools never talk HTTP themselves; they build a [`SearchRequest`] and hand
//! it to a [`SearchBackend`]. The production implementation is
//! [`AzureSearchClient`](crate::azure::AzureSearchClient); tests plug in
//! in-memory stubs.

use anyhow::Result;
use async_trait::async_trait;

/// A single search hit or fetched document, passed through as-is.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// How the backend should rank results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Full-text and vector similarity merged by the backend.
    Hybrid,
    /// Semantic re-ranking of full-text results.
    Semantic,
    /// Plain keyword search.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub top: u32,
    pub mode: SearchMode,
    /// Boolean filter expression in the backend's own syntax, forwarded verbatim.
    pub filter: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top: u32, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            top,
            mode,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Query in, ranked documents out.
///
/// Implementations own ranking, filter translation and any timeouts. They
/// must not retry on behalf of the caller.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Runs a query and returns at most `request.top` documents, best first.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>>;

    /// Looks up one document by key. A missing key is an error whose
    /// message contains `not found`.
    async fn fetch(&self, document_id: &str) -> Result<Document>;
}
