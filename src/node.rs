//! Wire data model shared between the backend and the UI-side store.

use serde::{Deserialize, Serialize};

/// A node in the scanned tree as the backend ships it.
///
/// `children` distinguishes three states: `None` means the children have not
/// been fetched, `Some(vec![])` means fetched and empty. Ids are assigned by
/// the backend and are unique and stable for the lifetime of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsNode {
    pub id: u64,
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub num_files: u64,
    pub num_dirs: u64,
    pub children: Option<Vec<FsNode>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

impl FsNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Copy of this node with no children attached.
    pub fn without_children(&self) -> Self {
        FsNode {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            size: self.size,
            num_files: self.num_files,
            num_dirs: self.num_dirs,
            children: None,
        }
    }
}

/// Outcome of one full-tree scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub root: FsNode,
    pub elapsed_millis: u64,
}
