//! Projection of the store into an ordered sequence of visible rows.
//!
//! Pure pre-order walk: a node's descendants appear iff every ancestor is
//! expanded, children stay in backend order, and unfetched subtrees simply
//! contribute no rows beyond the node itself. Recomputed whenever expand
//! state changes or a fetch completes; never cached across mutations.

use crate::store::TreeStore;

/// One renderable line. `parent_size` drives the percent-of-parent gauge;
/// the root carries its own size so its percentage is 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatRow {
    pub id: u64,
    pub depth: usize,
    pub parent_size: u64,
}

pub fn flatten(store: &TreeStore) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    if let Some(root_id) = store.root_id() {
        let root_size = store.node(root_id).map(|node| node.size).unwrap_or(0);
        push_subtree(store, root_id, 0, root_size, &mut rows);
    }
    rows
}

fn push_subtree(
    store: &TreeStore,
    id: u64,
    depth: usize,
    parent_size: u64,
    rows: &mut Vec<FlatRow>,
) {
    let Some(node) = store.node(id) else {
        return;
    };

    rows.push(FlatRow {
        id,
        depth,
        parent_size,
    });

    if !store.is_expanded(id) {
        return;
    }
    let Some(children) = node.children.as_ref() else {
        return;
    };
    for &child in children {
        push_subtree(store, child, depth + 1, node.size, rows);
    }
}
