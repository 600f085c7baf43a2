//! Remote index statistics.
//!
//! Used by both the `cidx status` CLI command and the `GET /status` HTTP
//! endpoint. Failures are reported in the response body rather than raised.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::index::{AlgoliaIndex, SearchIndex};
use crate::models::IndexStats;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub success: bool,
    pub index_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Reads statistics from `index` under the given retry policy.
pub async fn index_status(index: &dyn SearchIndex, policy: &RetryPolicy) -> IndexStatus {
    let result = policy.run("stats", move || index.stats()).await;
    let (stats, error) = match result {
        Ok(stats) => (Some(stats), None),
        Err(e) => {
            tracing::warn!(index = index.name(), error = %e, "could not read index statistics");
            (None, Some(e.to_string()))
        }
    };
    IndexStatus {
        success: error.is_none(),
        index_name: index.name().to_string(),
        stats,
        error,
        timestamp: Utc::now(),
    }
}

/// Like [`index_status`] but connects with the configured credentials first.
pub async fn status_from_config(config: &Config) -> IndexStatus {
    match AlgoliaIndex::from_config(&config.index) {
        Ok(index) => index_status(&index, &config.retry.policy()).await,
        Err(e) => IndexStatus {
            success: false,
            index_name: config.index.name.clone(),
            stats: None,
            error: Some(e.to_string()),
            timestamp: Utc::now(),
        },
    }
}

/// `cidx status`: print remote index statistics.
pub async fn run_status(config: &Config) -> Result<()> {
    let status = status_from_config(config).await;
    println!("index {}", status.index_name);
    match (&status.stats, &status.error) {
        (Some(stats), _) => {
            println!("  records: {}", stats.number_of_records);
            if let Some(size) = stats.data_size {
                println!("  data size: {} bytes", size);
            }
            if let Some(built) = &stats.last_build_time_utc {
                println!("  last build: {}", built);
            }
            println!("ok");
        }
        (None, Some(error)) => println!("failed: {}", error),
        (None, None) => println!("failed"),
    }
    Ok(())
}
