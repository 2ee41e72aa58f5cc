//! Error taxonomy for the backend collaborator.
//!
//! `ScanError` is whole-operation: the scanning indicator clears and the
//! prior tree stays intact. `FetchError` is per-node: it surfaces as that
//! node's error load state and never touches the rest of the tree.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("path not accessible: {path}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no scan result available to export")]
    NoScanAvailable,

    #[error("failed to write export file: {0}")]
    ExportIo(#[from] std::io::Error),

    #[error("failed to serialize export: {0}")]
    ExportSerialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unknown node id {0}")]
    UnknownNode(u64),

    #[error("node {0} is not a directory")]
    NotADirectory(u64),

    #[error("failed to open file manager: {0}")]
    RevealFailed(String),
}
