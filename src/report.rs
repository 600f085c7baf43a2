//! Persistence of the last run's [`SyncReport`].
//!
//! One JSON file at a fixed path, overwritten after every run. Writing is
//! best effort: a failure is logged and never changes the run's outcome.

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::SyncReport;

/// Writes `report` to `path`, creating parent directories as needed.
///
/// Returns whether the report was saved.
pub fn write_report(path: &Path, report: &SyncReport) -> bool {
    match try_write_report(path, report) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "saved run report");
            true
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = format!("{:#}", e), "could not save run report");
            false
        }
    }
}

fn try_write_report(path: &Path, report: &SyncReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Loads the last saved report, or `None` if no run has been recorded.
pub fn read_report(path: &Path) -> Result<Option<SyncReport>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let report = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse report {}", path.display()))?;
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn success(added: usize) -> SyncReport {
        SyncReport {
            success: true,
            added: Some(added),
            removed: Some(0),
            total: Some(added),
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn creates_directory_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".algolia").join("last-index.json");
        assert!(write_report(&path, &success(1)));
        let loaded = read_report(&path).unwrap().unwrap();
        assert_eq!(loaded, success_with_ts(1, loaded.timestamp));
    }

    fn success_with_ts(added: usize, ts: chrono::DateTime<Utc>) -> SyncReport {
        SyncReport {
            timestamp: ts,
            ..success(added)
        }
    }

    #[test]
    fn overwrites_previous_report() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        write_report(&path, &success(5));
        write_report(&path, &SyncReport::failed("boom"));
        let loaded = read_report(&path).unwrap().unwrap();
        assert!(!loaded.success);
        assert_eq!(loaded.error.as_deref(), Some("boom"));
        assert_eq!(loaded.added, None);
    }

    #[test]
    fn write_failure_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // Parent "directory" is a regular file.
        assert!(!write_report(&blocker.join("report.json"), &success(1)));
    }

    #[test]
    fn missing_report_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(read_report(&tmp.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn persisted_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("r.json");
        write_report(&path, &success(2));
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let mut keys: Vec<_> = raw.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["added", "removed", "success", "timestamp", "total"]);
    }
}
