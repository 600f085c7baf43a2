//! # Content Indexer
//!
//! Keeps a hosted Algolia search index in step with a directory of
//! front-matter Markdown documents.
//!
//! Every run reads the content root, builds one record per document, and
//! reconciles the remote index against it: stale records are deleted and
//! every current record is upserted. The outcome is written to a small
//! JSON report so the last run can be inspected later.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Markdown   │──▶│   Extract   │──▶│   Diff   │
//! │ content/... │   │ front-matter│   │ local vs │
//! └─────────────┘   └─────────────┘   │  remote  │
//!                                     └────┬─────┘
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │ Algolia  │       │  Report  │
//!                 │ settings │       │  .json   │
//!                 │ del / up │       └──────────┘
//!                 └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cidx records                  # preview local records
//! cidx sync --dry-run           # show what would change
//! cidx sync                     # reconcile the index
//! cidx serve                    # webhook server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`frontmatter`] | Front-matter splitting and parsing |
//! | [`extract`] | Document discovery and record building |
//! | [`index`] | Search index abstraction and Algolia client |
//! | [`remote_state`] | Enumerate remote identifiers |
//! | [`diff`] | Local/remote set difference |
//! | [`retry`] | Bounded retry of transient failures |
//! | [`sync`] | The reconciliation run |
//! | [`report`] | Last-run report persistence |
//! | [`status`] | Remote index statistics |
//! | [`records`] | Local record preview |
//! | [`server`] | Webhook HTTP server |

pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod frontmatter;
pub mod index;
pub mod models;
pub mod records;
pub mod remote_state;
pub mod report;
pub mod retry;
pub mod server;
pub mod status;
pub mod sync;
