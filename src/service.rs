//! In-process backend: runs the scanner and serves child fetches, JSON
//! export and reveal-in-file-manager out of the retained scan tree.

use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::backend::{Backend, ScanOptions};
use crate::error::{FetchError, ScanError};
use crate::node::{FsNode, ScanResult};
use crate::scan_tree::ScanTree;
use crate::scanner::{ProgressReporter, Scanner};

pub struct LocalBackend {
    reporter: Option<ProgressReporter>,
    // Session-wide id counter: ids are never reused across scans, so a
    // fetch aimed at a tree that has since been replaced cannot resolve
    // against an unrelated node.
    node_ids: AtomicU64,
    // Latest ticket handed out by `begin_scan`. Tickets are claimed on the
    // caller's thread, so their order is the order scans were requested in,
    // not the order the workers happened to start.
    tickets: AtomicU64,
    tree: Mutex<Option<ScanTree>>,
}

impl LocalBackend {
    pub fn new(reporter: Option<ProgressReporter>) -> Self {
        Self {
            reporter,
            node_ids: AtomicU64::new(0),
            tickets: AtomicU64::new(0),
            tree: Mutex::new(None),
        }
    }
}

impl Backend for LocalBackend {
    fn begin_scan(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn scan_directory(
        &self,
        path: &Path,
        options: ScanOptions,
        ticket: u64,
    ) -> Result<ScanResult, ScanError> {
        let started = Instant::now();

        let scanned = Scanner::new().scan(path, options, self.reporter.clone())?;
        let tree = ScanTree::ingest(scanned, &self.node_ids);
        let elapsed_millis = started.elapsed().as_millis() as u64;

        let root = tree.root_with_children();
        info!(
            "scan of {:?} finished in {}ms ({} bytes)",
            path,
            elapsed_millis,
            tree.total_size()
        );

        // Install only when this ticket is still the newest one issued; a
        // superseded scan must not replace the tree, whatever order the
        // workers finish in.
        let mut guard = self.tree.lock().expect("scan tree lock poisoned");
        if self.tickets.load(Ordering::SeqCst) == ticket {
            *guard = Some(tree);
        } else {
            info!("scan of {:?} superseded before completion, not installed", path);
        }
        drop(guard);

        Ok(ScanResult {
            root,
            elapsed_millis,
        })
    }

    fn fetch_children(&self, id: u64) -> Result<Vec<FsNode>, FetchError> {
        let guard = self.tree.lock().expect("scan tree lock poisoned");
        let tree = guard.as_ref().ok_or(FetchError::UnknownNode(id))?;
        tree.children_of(id)
    }

    fn export_json(&self, path: &Path, pretty: bool) -> Result<(), ScanError> {
        let guard = self.tree.lock().expect("scan tree lock poisoned");
        let tree = guard.as_ref().ok_or(ScanError::NoScanAvailable)?;
        let full = tree.full_tree();

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        if pretty {
            serde_json::to_writer_pretty(&mut writer, &full)?;
        } else {
            serde_json::to_writer(&mut writer, &full)?;
        }
        writer.flush()?;
        info!("exported scan to {:?}", path);
        Ok(())
    }

    fn reveal(&self, id: u64) -> Result<(), FetchError> {
        let target = {
            let guard = self.tree.lock().expect("scan tree lock poisoned");
            let tree = guard.as_ref().ok_or(FetchError::UnknownNode(id))?;
            let path = tree.path_of(id).ok_or(FetchError::UnknownNode(id))?;
            // Reveal the directory containing a file, the directory itself
            // otherwise.
            if path.is_dir() {
                path.to_path_buf()
            } else {
                path.parent().unwrap_or(path).to_path_buf()
            }
        };

        open::that(&target).map_err(|err| FetchError::RevealFailed(err.to_string()))
    }
}
