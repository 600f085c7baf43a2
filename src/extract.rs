//! Record extraction from the content root.
//!
//! Walks the content root and exactly one level of subdirectories, reads
//! every Markdown file except directory-index files, and turns each into an
//! [`IndexRecord`]. Record ids are the join key against the remote index:
//!
//! | Location | `id` | `permalink` |
//! |----------|------|-------------|
//! | `<root>/hello.md` | `{ns}_hello` | `/{ns}/hello` |
//! | `<root>/news/update.md` | `{ns}_news_update` | `/{ns}/news/update` |
//!
//! A file that cannot be read or whose front-matter is malformed is logged
//! and skipped; it never aborts the pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::ContentConfig;
use crate::error::{ExtractError, SyncError};
use crate::frontmatter;
use crate::models::{IndexRecord, SourceDocument};

const WORDS_PER_MINUTE: usize = 200;

/// Settings for one extraction pass, taken from `[content]`.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Prefix of every record id and permalink.
    pub base_namespace: String,
    /// Excerpt length in characters when front-matter has none.
    pub max_excerpt_length: usize,
    /// Directory-index file name that is never indexed.
    pub index_file_name: String,
    /// Patterns matched against paths relative to the root.
    pub exclude_globs: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from_config(&ContentConfig::default())
    }
}

impl ExtractOptions {
    pub fn from_config(content: &ContentConfig) -> Self {
        Self {
            base_namespace: content.base_namespace.clone(),
            max_excerpt_length: content.max_excerpt_length,
            index_file_name: content.index_file_name.clone(),
            exclude_globs: content.exclude_globs.clone(),
        }
    }
}

/// A file that was skipped during extraction.
#[derive(Debug)]
pub struct ExtractFailure {
    pub path: PathBuf,
    pub error: ExtractError,
}

/// Result of one extraction pass.
#[derive(Debug, Default)]
pub struct Extraction {
    /// One record per id, in walk order.
    pub records: Vec<IndexRecord>,
    /// Ids of `records`, in the same order.
    pub ids: Vec<String>,
    pub failures: Vec<ExtractFailure>,
}

/// Extracts records from every eligible file under `root`.
///
/// Fails only when `root` is not a directory or an exclude pattern is
/// invalid. Treating a missing root as empty content would mark every
/// remote record stale.
pub fn extract_records(root: &Path, options: &ExtractOptions) -> Result<Extraction, SyncError> {
    if !root.is_dir() {
        return Err(SyncError::ContentRoot(root.to_path_buf()));
    }

    let exclude_set = build_globset(&options.exclude_globs)?;
    let mut extraction = Extraction::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !is_markdown(path) || entry.file_name() == options.index_file_name.as_str() {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            tracing::debug!(path = %relative.display(), "excluded");
            continue;
        }

        let subdirectory = if entry.depth() == 2 {
            relative
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
        } else {
            None
        };

        let document = match read_document(path, subdirectory) {
            Ok(document) => document,
            Err(error) => {
                tracing::warn!(path = %relative.display(), error = %error, "skipping document");
                extraction.failures.push(ExtractFailure {
                    path: path.to_path_buf(),
                    error,
                });
                continue;
            }
        };

        let record = build_record(&document, options);
        tracing::debug!(id = %record.id, path = %relative.display(), "extracted");

        match positions.get(&record.id) {
            Some(&pos) => {
                tracing::warn!(
                    id = %record.id,
                    path = %relative.display(),
                    "duplicate record id, later file replaces earlier one"
                );
                extraction.records[pos] = record;
            }
            None => {
                positions.insert(record.id.clone(), extraction.records.len());
                extraction.ids.push(record.id.clone());
                extraction.records.push(record);
            }
        }
    }

    Ok(extraction)
}

/// Reads and parses one Markdown file.
pub fn read_document(
    path: &Path,
    subdirectory: Option<String>,
) -> Result<SourceDocument, ExtractError> {
    let text = std::fs::read_to_string(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (map, body) =
        frontmatter::split(&text).map_err(|message| ExtractError::FrontMatter {
            path: path.to_path_buf(),
            message,
        })?;

    Ok(SourceDocument {
        path: path.to_path_buf(),
        subdirectory,
        front_matter: frontmatter::parse(&map),
        body,
    })
}

/// Normalizes a parsed document into an index record.
pub fn build_record(document: &SourceDocument, options: &ExtractOptions) -> IndexRecord {
    let fm = &document.front_matter;
    let ns = &options.base_namespace;

    let slug = fm.slug.clone().unwrap_or_else(|| {
        document
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let (id, permalink) = match &document.subdirectory {
        Some(subdir) => (
            format!("{}_{}_{}", ns, subdir, slug),
            format!("/{}/{}/{}", ns, subdir, slug),
        ),
        None => (format!("{}_{}", ns, slug), format!("/{}/{}", ns, slug)),
    };

    let excerpt = fm
        .excerpt
        .clone()
        .unwrap_or_else(|| derive_excerpt(&document.body, options.max_excerpt_length));

    IndexRecord {
        id,
        title: fm.title.clone().unwrap_or_default(),
        body: document.body.clone(),
        excerpt,
        categories: fm.categories.clone(),
        published_at: fm.date.as_deref().and_then(parse_date_millis),
        full_path: permalink.clone(),
        permalink,
        subdirectory: document.subdirectory.clone(),
        image: fm.image.clone(),
        author: fm.author.clone(),
        estimated_reading_minutes: reading_minutes(&document.body),
    }
}

/// First `max_chars` characters of `body` followed by an ellipsis.
pub fn derive_excerpt(body: &str, max_chars: usize) -> String {
    let mut excerpt: String = body.chars().take(max_chars).collect();
    excerpt.push_str("...");
    excerpt
}

/// Whole minutes needed to read `body`, rounded up.
pub fn reading_minutes(body: &str) -> u64 {
    body.split_whitespace().count().div_ceil(WORDS_PER_MINUTE) as u64
}

/// Parses a front-matter date into epoch milliseconds (UTC).
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` (both
/// with optional fractional seconds) and `YYYY-MM-DD`.
pub fn parse_date_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
