//! Static task partitioning.
//!
//! The full task list is divided among workers before any worker starts, so
//! workers never pull from a shared queue and need no coordination with each
//! other.

/// Split `items` into up to `workers` non-empty groups, round-robin.
///
/// Group `i` receives the items at original indices `i, i + W, i + 2W, ...`.
/// Task lists are frequently pre-sorted by estimated cost (largest first);
/// interleaving spreads expensive and cheap items across all groups instead
/// of concentrating them, which partially compensates for the lack of dynamic
/// load balancing.
///
/// An empty input produces zero groups. If `workers` exceeds the item count,
/// only the first `items.len()` groups exist; the rest are never created.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let mut groups: Vec<Vec<T>> = Vec::with_capacity(workers.min(items.len()));

    for (index, item) in items.into_iter().enumerate() {
        let slot = index % workers;
        if slot == groups.len() {
            groups.push(Vec::new());
        }
        groups[slot].push(item);
    }

    groups
}
