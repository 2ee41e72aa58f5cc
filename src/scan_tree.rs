//! Backend-side storage of a completed scan.
//!
//! The scanner produces a nested tree; this module flattens it into an arena
//! with an id index so `fetch_children` lookups are O(1) instead of a
//! recursive search. The arena keeps the on-disk path of every node (the
//! wire model does not carry paths) so reveal-in-file-manager can resolve an
//! id back to a location.

use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FetchError;
use crate::node::{FsNode, NodeKind};
use crate::scanner::ScannedNode;

struct NodeData {
    id: u64,
    path: PathBuf,
    name: String,
    kind: NodeKind,
    size: u64,
    num_files: u64,
    num_dirs: u64,
}

/// Arena-backed tree of one full scan, keyed by backend-assigned node id.
pub struct ScanTree {
    arena: Arena<NodeData>,
    root: NodeId,
    id_index: HashMap<u64, NodeId>,
}

impl ScanTree {
    /// Ingest a scanned tree, assigning ids in pre-order from the session
    /// counter. The counter is shared across scans so ids are never reused
    /// within a backend session, which lets fetches for a superseded tree
    /// fail cleanly instead of resolving against the wrong node.
    pub fn ingest(scanned: ScannedNode, ids: &AtomicU64) -> Self {
        let mut arena = Arena::new();
        let mut id_index = HashMap::new();

        let root = Self::insert(&mut arena, &mut id_index, ids, scanned);

        Self {
            arena,
            root,
            id_index,
        }
    }

    fn insert(
        arena: &mut Arena<NodeData>,
        id_index: &mut HashMap<u64, NodeId>,
        ids: &AtomicU64,
        scanned: ScannedNode,
    ) -> NodeId {
        let id = ids.fetch_add(1, Ordering::SeqCst);

        let node_id = arena.new_node(NodeData {
            id,
            path: scanned.path,
            name: scanned.name,
            kind: scanned.kind,
            size: scanned.size,
            num_files: scanned.num_files,
            num_dirs: scanned.num_dirs,
        });
        id_index.insert(id, node_id);

        for child in scanned.children {
            let child_id = Self::insert(arena, id_index, ids, child);
            node_id.append(child_id, arena);
        }

        node_id
    }

    fn wire_node(&self, node_id: NodeId) -> FsNode {
        let data = self.arena[node_id].get();
        FsNode {
            id: data.id,
            name: data.name.clone(),
            kind: data.kind,
            size: data.size,
            num_files: data.num_files,
            num_dirs: data.num_dirs,
            children: None,
        }
    }

    /// Root node with its direct children attached, deeper levels stripped.
    /// This is the shape the scan response ships so the first level renders
    /// without a follow-up fetch.
    pub fn root_with_children(&self) -> FsNode {
        let mut root = self.wire_node(self.root);
        root.children = Some(
            self.root
                .children(&self.arena)
                .map(|child| self.wire_node(child))
                .collect(),
        );
        root
    }

    /// Shallow clones of a node's direct children, in stored order.
    pub fn children_of(&self, id: u64) -> Result<Vec<FsNode>, FetchError> {
        let &node_id = self.id_index.get(&id).ok_or(FetchError::UnknownNode(id))?;
        if self.arena[node_id].get().kind != NodeKind::Directory {
            return Err(FetchError::NotADirectory(id));
        }
        Ok(node_id
            .children(&self.arena)
            .map(|child| self.wire_node(child))
            .collect())
    }

    pub fn path_of(&self, id: u64) -> Option<&Path> {
        self.id_index
            .get(&id)
            .map(|&node_id| self.arena[node_id].get().path.as_path())
    }

    /// Fully nested tree, used by the JSON export.
    pub fn full_tree(&self) -> FsNode {
        self.full_subtree(self.root)
    }

    fn full_subtree(&self, node_id: NodeId) -> FsNode {
        let mut node = self.wire_node(node_id);
        let children: Vec<FsNode> = node_id
            .children(&self.arena)
            .map(|child| self.full_subtree(child))
            .collect();
        if !children.is_empty() {
            node.children = Some(children);
        }
        node
    }

    pub fn total_size(&self) -> u64 {
        self.arena[self.root].get().size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScannedNode;

    fn sample() -> ScannedNode {
        ScannedNode {
            path: PathBuf::from("/data"),
            name: "data".into(),
            kind: NodeKind::Directory,
            size: 300,
            num_files: 2,
            num_dirs: 2,
            children: vec![
                ScannedNode {
                    path: PathBuf::from("/data/sub"),
                    name: "sub".into(),
                    kind: NodeKind::Directory,
                    size: 200,
                    num_files: 1,
                    num_dirs: 1,
                    children: vec![ScannedNode {
                        path: PathBuf::from("/data/sub/big.bin"),
                        name: "big.bin".into(),
                        kind: NodeKind::File,
                        size: 200,
                        num_files: 1,
                        num_dirs: 0,
                        children: Vec::new(),
                    }],
                },
                ScannedNode {
                    path: PathBuf::from("/data/small.txt"),
                    name: "small.txt".into(),
                    kind: NodeKind::File,
                    size: 100,
                    num_files: 1,
                    num_dirs: 0,
                    children: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn ids_are_preorder_and_unique() {
        let tree = ScanTree::ingest(sample(), &AtomicU64::new(0));
        let root = tree.root_with_children();
        assert_eq!(root.id, 0);
        let children = root.children.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, 1); // sub
        assert_eq!(children[1].id, 3); // small.txt, after sub's subtree
    }

    #[test]
    fn root_ships_only_direct_children() {
        let tree = ScanTree::ingest(sample(), &AtomicU64::new(0));
        let root = tree.root_with_children();
        let children = root.children.unwrap();
        // Grandchildren are stripped; the sub directory arrives unfetched.
        assert!(children[0].children.is_none());
    }

    #[test]
    fn children_of_resolves_and_rejects() {
        let tree = ScanTree::ingest(sample(), &AtomicU64::new(0));
        let sub_children = tree.children_of(1).unwrap();
        assert_eq!(sub_children.len(), 1);
        assert_eq!(sub_children[0].name, "big.bin");

        assert!(matches!(
            tree.children_of(99),
            Err(FetchError::UnknownNode(99))
        ));
        assert!(matches!(
            tree.children_of(3),
            Err(FetchError::NotADirectory(3))
        ));
    }

    #[test]
    fn full_tree_is_nested() {
        let tree = ScanTree::ingest(sample(), &AtomicU64::new(0));
        let full = tree.full_tree();
        let sub = &full.children.as_ref().unwrap()[0];
        assert_eq!(sub.children.as_ref().unwrap()[0].name, "big.bin");
        assert_eq!(tree.total_size(), 300);
    }
}
