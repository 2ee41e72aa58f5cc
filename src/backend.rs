//! The backend collaborator contract.
//!
//! The store and the TUI only ever talk to this trait; the in-process
//! implementation lives in `service`. Calls block, so the host runs them on
//! worker threads and routes completions back through its event channel.

use std::path::Path;

use crate::error::{FetchError, ScanError};
use crate::node::{FsNode, ScanResult};

/// Scan-time constraints, passed through to the scanner opaquely.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub max_depth: Option<u32>,
    pub min_size: Option<u64>,
}

pub trait Backend: Send + Sync {
    /// Claim a ticket for an upcoming scan. Must be called on the thread
    /// that decides scan order (the UI thread), before the scan worker is
    /// spawned: the ticket order is the supersession order, and only the
    /// scan holding the newest ticket gets to install its tree.
    fn begin_scan(&self) -> u64;

    /// Scan a directory tree from scratch under a previously claimed ticket.
    /// The returned root carries its direct children pre-loaded; deeper
    /// levels are fetched on demand.
    fn scan_directory(
        &self,
        path: &Path,
        options: ScanOptions,
        ticket: u64,
    ) -> Result<ScanResult, ScanError>;

    /// Direct children of a previously scanned node, shallow (no grandchildren).
    fn fetch_children(&self, id: u64) -> Result<Vec<FsNode>, FetchError>;

    /// Write the last scan result to disk as JSON.
    fn export_json(&self, path: &Path, pretty: bool) -> Result<(), ScanError>;

    /// Open the node's location in the OS file manager.
    fn reveal(&self, id: u64) -> Result<(), FetchError>;
}
