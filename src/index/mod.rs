//! Remote search index abstraction.
//!
//! The [`SearchIndex`] trait covers the operations the synchronizer needs
//! from a hosted index (settings, paginated search, full enumeration, batch
//! upsert, batch delete) plus statistics for status reporting.
//!
//! Two implementations are provided:
//!
//! - [`AlgoliaIndex`](algolia::AlgoliaIndex): REST client for an Algolia-compatible service.
//! - [`MemoryIndex`](memory::MemoryIndex): in-process index with failure injection, for tests
//!   and dry runs against fixtures.
//!
//! Implementations must be `Send + Sync` so one handle can serve webhook
//! requests from any task.

pub mod algolia;
pub mod memory;

use async_trait::async_trait;

use crate::config::IndexSettings;
use crate::error::IndexError;
use crate::models::{IndexRecord, IndexStats};

pub use algolia::AlgoliaIndex;
pub use memory::MemoryIndex;

/// One page of identifiers returned by [`SearchIndex::search_page`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Identifiers of the hits on this page.
    pub ids: Vec<String>,
    /// Zero-based page number that was returned.
    pub page: usize,
    /// Total number of pages for the query.
    pub nb_pages: usize,
}

/// One batch of identifiers returned by [`SearchIndex::browse_page`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowsePage {
    pub ids: Vec<String>,
    /// Opaque position of the next batch; `None` once the index is exhausted.
    pub cursor: Option<String>,
}

/// A hosted search index the synchronizer can read and mutate.
///
/// Every method maps to one remote call so callers can wrap each in a
/// [`RetryPolicy`](crate::retry::RetryPolicy).
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Name of the remote index.
    fn name(&self) -> &str;

    /// Replaces searchable attributes, facets and custom ranking.
    async fn apply_settings(&self, settings: &IndexSettings) -> Result<(), IndexError>;

    /// Returns one page of hits for `query`. An empty query matches everything.
    async fn search_page(
        &self,
        query: &str,
        page: usize,
        hits_per_page: usize,
    ) -> Result<SearchPage, IndexError>;

    /// Returns the next batch of identifiers when enumerating the whole index.
    ///
    /// Pass `None` to start and the returned cursor to continue. The default
    /// walks [`search_page`](Self::search_page) with the page number as
    /// cursor, which is bounded by any pagination limit the index enforces.
    async fn browse_page(
        &self,
        cursor: Option<String>,
        hits_per_page: usize,
    ) -> Result<BrowsePage, IndexError> {
        let page = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| IndexError::Invalid(format!("invalid browse cursor '{}'", cursor)))?,
            None => 0,
        };
        let result = self.search_page("", page, hits_per_page).await?;
        let next = page + 1;
        let cursor = (!result.ids.is_empty() && next < result.nb_pages).then(|| next.to_string());
        Ok(BrowsePage {
            ids: result.ids,
            cursor,
        })
    }

    /// Adds or replaces records by id; returns the ids the index accepted.
    async fn save_objects(&self, records: &[IndexRecord]) -> Result<Vec<String>, IndexError>;

    /// Removes records by id. Unknown ids are ignored.
    async fn delete_objects(&self, ids: &[String]) -> Result<(), IndexError>;

    /// Record count and size of the index.
    async fn stats(&self) -> Result<IndexStats, IndexError>;
}
