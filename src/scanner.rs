//! Parallel recursive directory scanner.
//!
//! Builds the nested tree the backend ingests: per-directory aggregate sizes
//! and file/dir counts, children sorted biggest-first, optional max-depth and
//! min-size pruning. Progress is reported through a throttled callback with a
//! live preview of the largest top-level entries.

use dashmap::DashMap;
use log::warn;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::ScanOptions;
use crate::error::ScanError;
use crate::node::NodeKind;

const PROGRESS_EMIT_INTERVAL_MS: u64 = 100;
const PREVIEW_TOP_LIMIT: usize = 20;

/// A scanned entry before ids are assigned. Directories carry aggregate
/// size and counts over their whole subtree; a directory counts itself in
/// `num_dirs`.
#[derive(Debug)]
pub struct ScannedNode {
    pub path: PathBuf,
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub num_files: u64,
    pub num_dirs: u64,
    pub children: Vec<ScannedNode>,
}

#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
    pub top_level_preview: Vec<PreviewEntry>,
}

#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

pub type ProgressReporter = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// Parallel filesystem scanner with shared progress counters.
pub struct Scanner {
    file_count: AtomicU64,
    dir_count: AtomicU64,
    total_bytes: AtomicU64,
    last_emit_ms: AtomicU64,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            file_count: AtomicU64::new(0),
            dir_count: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            last_emit_ms: AtomicU64::new(0),
        }
    }

    /// Scan `root`, returning the aggregated tree. Fails only when the root
    /// itself is unreadable; unreadable subdirectories scan as empty.
    pub fn scan(
        &self,
        root: &Path,
        options: ScanOptions,
        reporter: Option<ProgressReporter>,
    ) -> Result<ScannedNode, ScanError> {
        // Surface root access problems up front rather than as a blank tree.
        fs::read_dir(root).map_err(|source| ScanError::Inaccessible {
            path: root.to_path_buf(),
            source,
        })?;

        self.file_count.store(0, Ordering::Relaxed);
        self.dir_count.store(0, Ordering::Relaxed);
        self.total_bytes.store(0, Ordering::Relaxed);
        self.last_emit_ms.store(0, Ordering::Relaxed);

        let started = Instant::now();
        let preview: Arc<DashMap<String, PreviewEntry>> = Arc::new(DashMap::new());

        let ctx = ScanContext {
            root: root.to_path_buf(),
            options,
            reporter,
            preview,
            started,
        };

        // The scan root itself is exempt from min-size pruning so the
        // result is never blank.
        let node = self.scan_dir(root, 0, &ctx);

        self.emit(&ctx, true);
        Ok(node)
    }

    fn snapshot(&self, preview: &DashMap<String, PreviewEntry>) -> ScanProgress {
        ScanProgress {
            files: self.file_count.load(Ordering::Relaxed),
            dirs: self.dir_count.load(Ordering::Relaxed),
            bytes: self.total_bytes.load(Ordering::Relaxed),
            top_level_preview: preview_snapshot(preview),
        }
    }

    fn scan_dir(&self, path: &Path, depth: u64, ctx: &ScanContext) -> ScannedNode {
        let name = path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .to_string();

        self.dir_count.fetch_add(1, Ordering::Relaxed);

        let mut node = ScannedNode {
            path: path.to_path_buf(),
            name,
            kind: NodeKind::Directory,
            size: 0,
            num_files: 0,
            num_dirs: 1,
            children: Vec::new(),
        };

        let entries: Vec<_> = match fs::read_dir(path) {
            Ok(entries) => entries.filter_map(|entry| entry.ok()).collect(),
            Err(err) => {
                warn!("skipping unreadable directory {:?}: {}", path, err);
                return node;
            }
        };

        let reached_max_depth = ctx
            .options
            .max_depth
            .map(|max| depth >= max as u64)
            .unwrap_or(false);

        let (files, dirs): (Vec<_>, Vec<_>) = entries.into_iter().partition(|entry| {
            entry
                .metadata()
                .map(|meta| meta.is_file())
                .unwrap_or_default()
        });

        let file_nodes: Vec<ScannedNode> = files
            .par_iter()
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                let name = entry.file_name().to_string_lossy().to_string();
                if name.is_empty() || meta.len() == 0 {
                    return None;
                }
                if let Some(min_size) = ctx.options.min_size {
                    if meta.len() < min_size {
                        return None;
                    }
                }

                self.file_count.fetch_add(1, Ordering::Relaxed);
                self.total_bytes.fetch_add(meta.len(), Ordering::Relaxed);
                self.record_preview(ctx, &entry.path(), meta.len(), false);
                self.emit(ctx, false);

                Some(ScannedNode {
                    path: entry.path(),
                    name,
                    kind: NodeKind::File,
                    size: meta.len(),
                    num_files: 1,
                    num_dirs: 0,
                    children: Vec::new(),
                })
            })
            .collect();

        node.size += file_nodes.iter().map(|n| n.size).sum::<u64>();
        node.num_files += file_nodes.len() as u64;

        // Subdirectories below the depth limit are omitted entirely.
        let dir_nodes: Vec<ScannedNode> = if reached_max_depth {
            Vec::new()
        } else {
            dirs.par_iter()
                .filter_map(|entry| {
                    let meta = entry.metadata().ok()?;
                    if !meta.is_dir() {
                        return None;
                    }
                    let child = self.scan_dir(&entry.path(), depth + 1, ctx);
                    if let Some(min_size) = ctx.options.min_size {
                        if child.size < min_size {
                            // Back the pruned subtree's tally out so the
                            // final progress snapshot matches the tree.
                            self.file_count.fetch_sub(child.num_files, Ordering::Relaxed);
                            self.dir_count.fetch_sub(child.num_dirs, Ordering::Relaxed);
                            self.total_bytes.fetch_sub(child.size, Ordering::Relaxed);
                            return None;
                        }
                    }
                    self.record_preview(ctx, &child.path, child.size, true);
                    Some(child)
                })
                .collect()
        };

        node.size += dir_nodes.iter().map(|n| n.size).sum::<u64>();
        node.num_files += dir_nodes.iter().map(|n| n.num_files).sum::<u64>();
        node.num_dirs += dir_nodes.iter().map(|n| n.num_dirs).sum::<u64>();

        node.children.extend(file_nodes);
        node.children.extend(dir_nodes);
        node.children.sort_by(|a, b| b.size.cmp(&a.size));

        node
    }

    fn record_preview(&self, ctx: &ScanContext, path: &Path, size: u64, is_dir: bool) {
        if ctx.reporter.is_none() {
            return;
        }
        let Some(name) = top_level_name(&ctx.root, path) else {
            return;
        };
        let mut entry = ctx
            .preview
            .entry(name.clone())
            .or_insert_with(|| PreviewEntry {
                name,
                size: 0,
                is_dir,
            });
        if is_dir {
            // A fully aggregated directory supersedes its partial file tally.
            entry.size = entry.size.max(size);
            entry.is_dir = true;
        } else {
            entry.size = entry.size.saturating_add(size);
        }
    }

    fn emit(&self, ctx: &ScanContext, force: bool) {
        let Some(reporter) = ctx.reporter.as_ref() else {
            return;
        };
        let elapsed_ms = ctx.started.elapsed().as_millis() as u64;
        if !force && !self.should_emit(elapsed_ms) {
            return;
        }
        reporter(self.snapshot(&ctx.preview));
    }

    fn should_emit(&self, elapsed_ms: u64) -> bool {
        let previous = self.last_emit_ms.load(Ordering::Relaxed);
        if elapsed_ms.saturating_sub(previous) < PROGRESS_EMIT_INTERVAL_MS {
            return false;
        }
        self.last_emit_ms
            .compare_exchange(previous, elapsed_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

struct ScanContext {
    root: PathBuf,
    options: ScanOptions,
    reporter: Option<ProgressReporter>,
    preview: Arc<DashMap<String, PreviewEntry>>,
    started: Instant,
}

fn top_level_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let first = rel.components().next()?;
    Some(first.as_os_str().to_string_lossy().to_string())
}

fn preview_snapshot(preview: &DashMap<String, PreviewEntry>) -> Vec<PreviewEntry> {
    let mut entries: Vec<_> = preview.iter().map(|entry| entry.value().clone()).collect();
    entries.sort_by(|a, b| b.size.cmp(&a.size));
    entries.truncate(PREVIEW_TOP_LIMIT);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, bytes: usize) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(&vec![0u8; bytes]).unwrap();
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.bin", 1000);
        write_file(tmp.path(), "b.bin", 50);
        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        write_file(&sub, "c.bin", 3000);
        let deep = sub.join("deep");
        fs::create_dir(&deep).unwrap();
        write_file(&deep, "d.bin", 200);
        tmp
    }

    #[test]
    fn aggregates_sizes_and_counts() {
        let tmp = fixture();
        let scanner = Scanner::new();
        let root = scanner
            .scan(tmp.path(), ScanOptions::default(), None)
            .unwrap();

        assert_eq!(root.size, 4250);
        assert_eq!(root.num_files, 4);
        // root + sub + deep
        assert_eq!(root.num_dirs, 3);
    }

    #[test]
    fn children_sorted_biggest_first() {
        let tmp = fixture();
        let scanner = Scanner::new();
        let root = scanner
            .scan(tmp.path(), ScanOptions::default(), None)
            .unwrap();

        let sizes: Vec<u64> = root.children.iter().map(|c| c.size).collect();
        let mut sorted = sizes.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sizes, sorted);
        // sub (3200) comes before a.bin (1000)
        assert_eq!(root.children[0].name, "sub");
    }

    #[test]
    fn min_size_prunes_files_and_subtrees() {
        let tmp = fixture();
        let scanner = Scanner::new();
        let options = ScanOptions {
            min_size: Some(500),
            ..Default::default()
        };
        let root = scanner.scan(tmp.path(), options, None).unwrap();

        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"a.bin"));
        assert!(names.contains(&"sub"));
        assert!(!names.contains(&"b.bin"));

        let sub = root.children.iter().find(|c| c.name == "sub").unwrap();
        // deep's 200 bytes fall below the threshold; the pruned subtree does
        // not count toward its parent either.
        assert!(sub.children.iter().all(|c| c.name != "deep"));
        assert_eq!(sub.size, 3000);
    }

    #[test]
    fn max_depth_stops_recursion() {
        let tmp = fixture();
        let scanner = Scanner::new();
        let options = ScanOptions {
            max_depth: Some(1),
            ..Default::default()
        };
        let root = scanner.scan(tmp.path(), options, None).unwrap();

        let sub = root.children.iter().find(|c| c.name == "sub").unwrap();
        assert!(sub.children.iter().all(|c| c.name != "deep"));
        // Files directly under sub are still scanned.
        assert!(sub.children.iter().any(|c| c.name == "c.bin"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let scanner = Scanner::new();
        let result = scanner.scan(
            Path::new("/nonexistent/treescope-test"),
            ScanOptions::default(),
            None,
        );
        assert!(matches!(result, Err(ScanError::Inaccessible { .. })));
    }

    #[test]
    fn progress_reports_totals() {
        let tmp = fixture();
        let scanner = Scanner::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter: ProgressReporter = Arc::new(move |progress: ScanProgress| {
            sink.lock().unwrap().push(progress);
        });

        scanner
            .scan(tmp.path(), ScanOptions::default(), Some(reporter))
            .unwrap();

        let seen = seen.lock().unwrap();
        let last = seen.last().expect("final progress emitted");
        assert_eq!(last.files, 4);
        assert_eq!(last.bytes, 4250);
        assert!(!last.top_level_preview.is_empty());
    }

    #[test]
    fn final_progress_matches_min_size_pruned_tree() {
        let tmp = fixture();
        let scanner = Scanner::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter: ProgressReporter = Arc::new(move |progress: ScanProgress| {
            sink.lock().unwrap().push(progress);
        });

        let options = ScanOptions {
            min_size: Some(500),
            ..Default::default()
        };
        let root = scanner.scan(tmp.path(), options, Some(reporter)).unwrap();

        // Pruned subtrees (deep, which ends up empty under the threshold)
        // must not linger in the totals.
        let seen = seen.lock().unwrap();
        let last = seen.last().expect("final progress emitted");
        assert_eq!(last.files, root.num_files);
        assert_eq!(last.dirs, root.num_dirs);
        assert_eq!(last.bytes, root.size);
    }
}
