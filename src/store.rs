//! Tree node store: the single source of truth for discovered nodes and
//! their per-node UI state.
//!
//! The store is a state machine that emits `FetchRequest`s instead of doing
//! I/O itself: `toggle_expand` and `retry` return the request the host must
//! run, and `apply_children` / `apply_fetch_error` feed the completion back.
//! This keeps the mutual-exclusion and retry rules testable without threads,
//! and the host free to run fetches however it likes.

use std::collections::HashMap;

use crate::node::{FsNode, NodeKind};

/// Per-node load state. Transitions only NotLoaded → Loading → {Loaded,
/// Error}; Error → Loading on retry. Loaded children are never re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct NodeUiState {
    pub expanded: bool,
    pub load_state: LoadState,
}

/// A children fetch the host must issue. At most one is outstanding per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: u64,
}

/// A discovered node inside the store. Display fields are copied out of the
/// wire node; `children` holds child ids in backend order once fetched.
#[derive(Debug, Clone)]
pub struct StoredNode {
    pub id: u64,
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub num_files: u64,
    pub num_dirs: u64,
    pub children: Option<Vec<u64>>,
}

impl StoredNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

#[derive(Default)]
pub struct TreeStore {
    nodes: HashMap<u64, StoredNode>,
    ui: HashMap<u64, NodeUiState>,
    root: Option<u64>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire store with a freshly scanned root. All prior nodes,
    /// UI state and fetch bookkeeping are discarded; completions for the old
    /// tree will target unknown ids and fall through harmlessly.
    pub fn initialize(&mut self, root: FsNode) {
        self.nodes.clear();
        self.ui.clear();
        self.root = Some(root.id);
        self.ingest(root);
    }

    fn ingest(&mut self, node: FsNode) {
        let child_ids = node.children.as_ref().map(|children| {
            children.iter().map(|child| child.id).collect::<Vec<u64>>()
        });

        self.nodes.insert(
            node.id,
            StoredNode {
                id: node.id,
                name: node.name,
                kind: node.kind,
                size: node.size,
                num_files: node.num_files,
                num_dirs: node.num_dirs,
                children: child_ids,
            },
        );

        if let Some(children) = node.children {
            for child in children {
                self.ingest(child);
            }
        }
    }

    pub fn root_id(&self) -> Option<u64> {
        self.root
    }

    pub fn node(&self, id: u64) -> Option<&StoredNode> {
        self.nodes.get(&id)
    }

    pub fn ui_state(&self, id: u64) -> NodeUiState {
        self.ui.get(&id).cloned().unwrap_or_default()
    }

    pub fn is_expanded(&self, id: u64) -> bool {
        self.ui.get(&id).map(|state| state.expanded).unwrap_or(false)
    }

    pub fn load_state(&self, id: u64) -> LoadState {
        self.ui
            .get(&id)
            .map(|state| state.load_state.clone())
            .unwrap_or_default()
    }

    /// Flip a node's expanded flag. Returns the fetch the host must issue
    /// when the node is a directory whose children are absent and not
    /// already being fetched; `None` in every other case.
    pub fn toggle_expand(&mut self, id: u64) -> Option<FetchRequest> {
        if !self.nodes.contains_key(&id) {
            return None;
        }

        let state = self.ui.entry(id).or_default();
        state.expanded = !state.expanded;
        if !state.expanded {
            // Collapsing keeps cached children and load state.
            return None;
        }

        self.fetch_if_needed(id)
    }

    /// Re-issue the fetch for a node whose last fetch failed. No-op in any
    /// other load state.
    pub fn retry(&mut self, id: u64) -> Option<FetchRequest> {
        if !matches!(self.load_state(id), LoadState::Error(_)) {
            return None;
        }
        self.fetch_if_needed(id)
    }

    fn fetch_if_needed(&mut self, id: u64) -> Option<FetchRequest> {
        let node = self.nodes.get(&id)?;
        if !node.is_dir() || node.children.is_some() {
            return None;
        }

        let state = self.ui.entry(id).or_default();
        match state.load_state {
            // At most one fetch in flight per id; Loaded never re-fetches.
            LoadState::Loading | LoadState::Loaded => None,
            LoadState::NotLoaded | LoadState::Error(_) => {
                state.load_state = LoadState::Loading;
                Some(FetchRequest { id })
            }
        }
    }

    /// Fetch success. Ignored when the id is unknown, which happens when a
    /// completion arrives after `initialize` replaced the tree.
    pub fn apply_children(&mut self, id: u64, children: Vec<FsNode>) {
        if !self.nodes.contains_key(&id) {
            return;
        }

        let child_ids: Vec<u64> = children.iter().map(|child| child.id).collect();
        for child in children {
            self.ingest(child);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = Some(child_ids);
        }
        self.ui.entry(id).or_default().load_state = LoadState::Loaded;
    }

    /// Fetch failure: the node keeps its absent children and becomes
    /// retryable. Ignored for unknown ids.
    pub fn apply_fetch_error(&mut self, id: u64, message: String) {
        if !self.nodes.contains_key(&id) {
            return;
        }
        self.ui.entry(id).or_default().load_state = LoadState::Error(message);
    }
}
