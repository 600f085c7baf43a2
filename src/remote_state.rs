//! Enumeration of the identifiers currently stored in the remote index.

use std::collections::BTreeSet;

use crate::error::IndexError;
use crate::index::SearchIndex;

/// Collects every identifier in `index` by browsing it batch by batch.
///
/// Stops when the index returns no further cursor or a batch comes back
/// empty. Any error is logged and yields an empty set: not knowing the
/// remote state leads to redundant upserts, never to wrongful deletes.
pub async fn fetch_remote_ids(index: &dyn SearchIndex, page_size: usize) -> BTreeSet<String> {
    match try_fetch_remote_ids(index, page_size).await {
        Ok(ids) => {
            tracing::info!(index = index.name(), count = ids.len(), "fetched remote ids");
            ids
        }
        Err(e) => {
            tracing::warn!(
                index = index.name(),
                error = %e,
                "could not fetch remote ids, assuming the index is empty"
            );
            BTreeSet::new()
        }
    }
}

/// Like [`fetch_remote_ids`] but surfaces the first error.
pub async fn try_fetch_remote_ids(
    index: &dyn SearchIndex,
    page_size: usize,
) -> Result<BTreeSet<String>, IndexError> {
    let mut ids = BTreeSet::new();
    let mut cursor = None;

    loop {
        let batch = index.browse_page(cursor, page_size).await?;
        if batch.ids.is_empty() {
            break;
        }
        ids.extend(batch.ids);

        match batch.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(ids)
}
