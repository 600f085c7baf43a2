//! Reconciliation pipeline.
//!
//! One run executes strictly in order:
//!
//! ```text
//! fetch remote ids ─▶ extract records ─▶ diff ─▶ settings ─▶ delete stale ─▶ upsert ─▶ report
//! ```
//!
//! Settings, delete and upsert each go through the configured
//! [`RetryPolicy`]. A phase that exhausts its attempts marks the run as
//! failed but does not stop the phases after it. The report is written
//! whatever the outcome.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;
use crate::diff;
use crate::error::SyncError;
use crate::extract::{extract_records, ExtractOptions};
use crate::index::{AlgoliaIndex, SearchIndex};
use crate::models::{IndexRecord, SyncReport};
use crate::remote_state::fetch_remote_ids;
use crate::report::write_report;
use crate::retry::RetryPolicy;

/// What a run intends to change, computed before any mutation.
#[derive(Debug)]
pub struct SyncPlan {
    pub remote_ids: BTreeSet<String>,
    /// Every locally extracted record; all are upserted.
    pub records: Vec<IndexRecord>,
    /// Remote ids with no local counterpart.
    pub to_delete: Vec<String>,
    /// Local ids not yet present remotely.
    pub to_add: Vec<String>,
    /// Files skipped because they could not be read or parsed.
    pub skipped: Vec<PathBuf>,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct SyncOutcome {
    pub index_name: String,
    pub report: SyncReport,
    pub deleted: Vec<String>,
    pub upserted: usize,
    pub skipped: Vec<PathBuf>,
}

impl SyncOutcome {
    fn aborted(index_name: &str, error: impl std::fmt::Display) -> Self {
        Self {
            index_name: index_name.to_string(),
            report: SyncReport::failed(error.to_string()),
            deleted: Vec::new(),
            upserted: 0,
            skipped: Vec::new(),
        }
    }
}

/// Runs reconciliation passes of one content root against one index.
///
/// Borrows its config and index, so it is cheap to build per run.
pub struct Synchronizer<'a> {
    config: &'a Config,
    index: &'a dyn SearchIndex,
    policy: RetryPolicy,
}

impl<'a> Synchronizer<'a> {
    /// Uses the retry policy from `[retry]`.
    pub fn new(config: &'a Config, index: &'a dyn SearchIndex) -> Self {
        Self {
            config,
            index,
            policy: config.retry.policy(),
        }
    }

    /// Replaces the retry policy for remote calls.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches remote state, extracts local records and diffs them.
    pub async fn plan(&self) -> Result<SyncPlan, SyncError> {
        let remote_ids = fetch_remote_ids(self.index, self.config.index.page_size).await;

        let options = ExtractOptions::from_config(&self.config.content);
        let extraction = extract_records(&self.config.content.root, &options)?;
        tracing::info!(
            root = %self.config.content.root.display(),
            records = extraction.records.len(),
            skipped = extraction.failures.len(),
            "extracted local records"
        );

        let local_ids: BTreeSet<String> = extraction.ids.iter().cloned().collect();
        let to_delete = diff::ids_to_delete(&remote_ids, &local_ids);
        let to_add = diff::ids_to_add(&remote_ids, &local_ids);

        Ok(SyncPlan {
            remote_ids,
            records: extraction.records,
            to_delete,
            to_add,
            skipped: extraction.failures.into_iter().map(|f| f.path).collect(),
        })
    }

    /// Runs the whole pipeline and persists the report.
    pub async fn run(&self) -> SyncOutcome {
        let outcome = match self.plan().await {
            Ok(plan) => self.apply(plan).await,
            Err(e) => {
                tracing::error!(error = %e, "sync aborted before touching the index");
                SyncOutcome::aborted(self.index.name(), e)
            }
        };
        write_report(&self.config.report.path, &outcome.report);
        outcome
    }

    /// Applies settings, deletes stale ids and upserts current records.
    pub async fn apply(&self, plan: SyncPlan) -> SyncOutcome {
        let index = self.index;
        let batch_size = self.config.index.batch_size.max(1);
        let mut errors: Vec<String> = Vec::new();

        let settings = &self.config.index.settings;
        if let Err(e) = self
            .policy
            .run("settings", move || index.apply_settings(settings))
            .await
        {
            errors.push(format!("settings: {}", e));
        }

        let mut deleted = Vec::new();
        if plan.to_delete.is_empty() {
            tracing::info!("no stale records to remove");
        } else {
            tracing::info!(count = plan.to_delete.len(), "removing stale records");
            for batch in plan.to_delete.chunks(batch_size) {
                match self
                    .policy
                    .run("delete", move || index.delete_objects(batch))
                    .await
                {
                    Ok(()) => deleted.extend_from_slice(batch),
                    Err(e) => errors.push(format!("delete: {}", e)),
                }
            }
        }

        let mut accepted: HashSet<String> = HashSet::new();
        if plan.records.is_empty() {
            tracing::warn!("no content found to index");
        } else {
            tracing::info!(count = plan.records.len(), "upserting records");
            for batch in plan.records.chunks(batch_size) {
                match self
                    .policy
                    .run("upsert", move || index.save_objects(batch))
                    .await
                {
                    Ok(ids) => accepted.extend(ids),
                    Err(e) => errors.push(format!("upsert: {}", e)),
                }
            }
        }

        let added = plan
            .to_add
            .iter()
            .filter(|id| accepted.contains(id.as_str()))
            .count();

        let report = SyncReport {
            success: errors.is_empty(),
            added: Some(added),
            removed: Some(deleted.len()),
            total: Some(plan.records.len()),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            timestamp: chrono::Utc::now(),
        };

        if report.success {
            tracing::info!(added, removed = deleted.len(), total = plan.records.len(), "sync complete");
        } else {
            tracing::error!(error = report.error.as_deref().unwrap_or_default(), "sync finished with errors");
        }

        SyncOutcome {
            index_name: index.name().to_string(),
            report,
            deleted,
            upserted: accepted.len(),
            skipped: plan.skipped,
        }
    }
}

/// Runs a sync against the configured remote index.
///
/// Missing credentials end the run before any remote call; the failure is
/// still written to the report.
pub async fn sync_from_config(config: &Config) -> SyncOutcome {
    match AlgoliaIndex::from_config(&config.index) {
        Ok(index) => Synchronizer::new(config, &index).run().await,
        Err(e) => {
            tracing::error!(error = %e, "cannot connect to search index");
            let outcome = SyncOutcome::aborted(&config.index.name, e);
            write_report(&config.report.path, &outcome.report);
            outcome
        }
    }
}

/// `cidx sync`: run (or preview) a sync and print a summary.
pub async fn run_sync(config: &Config, dry_run: bool, fail_on_error: bool) -> Result<()> {
    if dry_run {
        let index = AlgoliaIndex::from_config(&config.index)?;
        let plan = Synchronizer::new(config, &index).plan().await?;
        print_plan(index.name(), &plan);
        return Ok(());
    }

    let outcome = sync_from_config(config).await;
    print_outcome(&outcome);

    if fail_on_error && !outcome.report.success {
        anyhow::bail!(
            "sync failed: {}",
            outcome.report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_plan(index_name: &str, plan: &SyncPlan) {
    println!("sync {} (dry-run)", index_name);
    println!("  remote records: {}", plan.remote_ids.len());
    println!("  local records: {}", plan.records.len());
    println!("  skipped files: {}", plan.skipped.len());
    println!("  would add: {}", plan.to_add.len());
    println!("  would remove: {}", plan.to_delete.len());
    for id in &plan.to_delete {
        println!("    - {}", id);
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    let report = &outcome.report;
    println!("sync {}", outcome.index_name);
    if let Some(total) = report.total {
        println!("  local records: {}", total);
        println!("  skipped files: {}", outcome.skipped.len());
        println!("  upserted: {}", outcome.upserted);
    }
    if let Some(added) = report.added {
        println!("  added: {}", added);
    }
    if let Some(removed) = report.removed {
        println!("  removed: {}", removed);
    }
    match &report.error {
        None => println!("ok"),
        Some(error) => println!("failed: {}", error),
    }
}
