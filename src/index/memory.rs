//! In-memory [`SearchIndex`] implementation.
//!
//! Stores records in a `BTreeMap` behind `std::sync::RwLock`, counts calls
//! per operation, and can be told to fail upcoming calls so retry and
//! phase-isolation behavior can be exercised without a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::config::IndexSettings;
use crate::error::IndexError;
use crate::models::{IndexRecord, IndexStats};

use super::{SearchIndex, SearchPage};

/// Operations that can be counted or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Settings,
    Search,
    Save,
    Delete,
    Stats,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Transient,
    Permanent,
}

/// In-memory index for tests and local experiments.
pub struct MemoryIndex {
    name: String,
    records: RwLock<BTreeMap<String, IndexRecord>>,
    settings: RwLock<Option<IndexSettings>>,
    calls: Mutex<HashMap<Operation, u32>>,
    /// Queued failures per operation; `None` count means "always".
    failures: Mutex<HashMap<Operation, (Failure, Option<u32>)>>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            settings: RwLock::new(None),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an index that already holds records with the given ids.
    pub fn with_ids<I, S>(name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = Self::new(name);
        {
            let mut records = index.records.write().unwrap_or_else(|e| e.into_inner());
            for id in ids {
                let id = id.into();
                records.insert(id.clone(), placeholder(&id));
            }
        }
        index
    }

    /// Makes the next `count` calls of `op` fail with a transient error.
    pub fn fail_transient(&self, op: Operation, count: u32) {
        self.lock_failures().insert(op, (Failure::Transient, Some(count)));
    }

    /// Makes every call of `op` fail with a transient error.
    pub fn fail_always(&self, op: Operation) {
        self.lock_failures().insert(op, (Failure::Transient, None));
    }

    /// Makes every call of `op` fail with a non-retryable error.
    pub fn fail_permanently(&self, op: Operation) {
        self.lock_failures().insert(op, (Failure::Permanent, None));
    }

    pub fn clear_failures(&self) {
        self.lock_failures().clear();
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn calls(&self, op: Operation) -> u32 {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    pub fn ids(&self) -> Vec<String> {
        self.read_records().keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<IndexRecord> {
        self.read_records().get(id).cloned()
    }

    pub fn settings(&self) -> Option<IndexSettings> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashMap<Operation, (Failure, Option<u32>)>> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_records(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, IndexRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Counts the call and returns the injected failure, if any.
    fn enter(&self, op: Operation) -> Result<(), IndexError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(op)
            .or_insert(0) += 1;

        let mut failures = self.lock_failures();
        let Some((failure, remaining)) = failures.get_mut(&op) else {
            return Ok(());
        };
        let failure = *failure;
        match remaining {
            Some(0) => {
                failures.remove(&op);
                return Ok(());
            }
            Some(n) => *n -= 1,
            None => {}
        }

        Err(match failure {
            Failure::Transient => IndexError::Unavailable(format!("injected {:?} failure", op)),
            Failure::Permanent => IndexError::Status {
                status: 400,
                message: format!("injected {:?} failure", op),
            },
        })
    }
}

fn placeholder(id: &str) -> IndexRecord {
    IndexRecord {
        id: id.to_string(),
        title: String::new(),
        body: String::new(),
        excerpt: String::new(),
        categories: Vec::new(),
        published_at: None,
        permalink: String::new(),
        full_path: String::new(),
        subdirectory: None,
        image: None,
        author: None,
        estimated_reading_minutes: 0,
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply_settings(&self, settings: &IndexSettings) -> Result<(), IndexError> {
        self.enter(Operation::Settings)?;
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = Some(settings.clone());
        Ok(())
    }

    async fn search_page(
        &self,
        query: &str,
        page: usize,
        hits_per_page: usize,
    ) -> Result<SearchPage, IndexError> {
        self.enter(Operation::Search)?;
        if hits_per_page == 0 {
            return Err(IndexError::Invalid("hitsPerPage must be > 0".to_string()));
        }

        let needle = query.to_lowercase();
        let matching: Vec<String> = self
            .read_records()
            .values()
            .filter(|r| {
                needle.is_empty()
                    || r.title.to_lowercase().contains(&needle)
                    || r.body.to_lowercase().contains(&needle)
            })
            .map(|r| r.id.clone())
            .collect();

        let nb_pages = matching.len().div_ceil(hits_per_page);
        let ids = matching
            .into_iter()
            .skip(page * hits_per_page)
            .take(hits_per_page)
            .collect();

        Ok(SearchPage {
            ids,
            page,
            nb_pages,
        })
    }

    async fn save_objects(&self, records: &[IndexRecord]) -> Result<Vec<String>, IndexError> {
        self.enter(Operation::Save)?;
        let mut stored = self.records.write().unwrap_or_else(|e| e.into_inner());
        let mut accepted = Vec::with_capacity(records.len());
        for record in records {
            stored.insert(record.id.clone(), record.clone());
            accepted.push(record.id.clone());
        }
        Ok(accepted)
    }

    async fn delete_objects(&self, ids: &[String]) -> Result<(), IndexError> {
        self.enter(Operation::Delete)?;
        let mut stored = self.records.write().unwrap_or_else(|e| e.into_inner());
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats, IndexError> {
        self.enter(Operation::Stats)?;
        let records = self.read_records();
        let data_size = records
            .values()
            .map(|r| serde_json::to_vec(r).map(|v| v.len() as u64).unwrap_or(0))
            .sum();
        Ok(IndexStats {
            number_of_records: records.len() as u64,
            data_size: Some(data_size),
            last_build_time_utc: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn paginates_ids() {
        let index = MemoryIndex::with_ids("test", ["a", "b", "c", "d", "e"]);
        let first = index.search_page("", 0, 2).await.unwrap();
        assert_eq!(first.ids, vec!["a", "b"]);
        assert_eq!(first.nb_pages, 3);
        let last = index.search_page("", 2, 2).await.unwrap();
        assert_eq!(last.ids, vec!["e"]);
        let beyond = index.search_page("", 3, 2).await.unwrap();
        assert!(beyond.ids.is_empty());
    }

    #[tokio::test]
    async fn empty_index_has_no_pages() {
        let index = MemoryIndex::new("test");
        let page = index.search_page("", 0, 100).await.unwrap();
        assert!(page.ids.is_empty());
        assert_eq!(page.nb_pages, 0);
    }

    #[tokio::test]
    async fn injected_failures_run_out() {
        let index = MemoryIndex::new("test");
        index.fail_transient(Operation::Delete, 2);
        assert!(index.delete_objects(&[]).await.is_err());
        assert!(index.delete_objects(&[]).await.is_err());
        assert!(index.delete_objects(&[]).await.is_ok());
        assert_eq!(index.calls(Operation::Delete), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_transient() {
        let index = MemoryIndex::new("test");
        index.fail_permanently(Operation::Settings);
        let err = index
            .apply_settings(&IndexSettings::default())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn save_then_delete() {
        let index = MemoryIndex::new("test");
        let accepted = index
            .save_objects(&[placeholder("x"), placeholder("y")])
            .await
            .unwrap();
        assert_eq!(accepted, vec!["x", "y"]);
        index.delete_objects(&["x".to_string()]).await.unwrap();
        assert_eq!(index.ids(), vec!["y"]);
        assert_eq!(index.stats().await.unwrap().number_of_records, 1);
    }
}
