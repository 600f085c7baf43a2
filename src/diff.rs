//! Set arithmetic between remote and local identifiers.

use std::collections::BTreeSet;

/// Remote ids with no local counterpart, sorted.
pub fn ids_to_delete(remote: &BTreeSet<String>, local: &BTreeSet<String>) -> Vec<String> {
    remote.difference(local).cloned().collect()
}

/// Local ids the remote index does not hold yet, sorted.
pub fn ids_to_add(remote: &BTreeSet<String>, local: &BTreeSet<String>) -> Vec<String> {
    local.difference(remote).cloned().collect()
}
