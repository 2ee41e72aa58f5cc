//! Scan lifecycle: at most the latest requested scan wins.
//!
//! Every scan carries a monotonically increasing ticket, claimed from the
//! backend on the requesting thread. A completion is only applied when its
//! ticket is the newest one registered, so a slow older scan can never
//! overwrite the result of a newer one, whatever order the worker threads
//! finish in — and because the backend gates its own tree installation on
//! the same ticket, the displayed tree and the served tree cannot diverge.

use log::debug;

use crate::node::ScanResult;

#[derive(Default)]
pub struct ScanOrchestrator {
    latest_seq: Option<u64>,
    scanning: bool,
    elapsed_millis: Option<u64>,
}

impl ScanOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the latest requested scan has not completed.
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Elapsed time of the last applied scan.
    pub fn elapsed_millis(&self) -> Option<u64> {
        self.elapsed_millis
    }

    /// Register a freshly claimed ticket and raise the scanning indicator.
    /// Any scan still in flight is superseded from this point on.
    pub fn begin(&mut self, seq: u64) {
        self.latest_seq = Some(seq);
        self.scanning = true;
    }

    /// Apply a successful completion. Returns the result to install iff the
    /// ticket is still the latest; stale completions are discarded and do
    /// not touch the scanning indicator.
    pub fn complete(&mut self, seq: u64, result: ScanResult) -> Option<ScanResult> {
        if self.latest_seq != Some(seq) {
            debug!("discarding stale scan completion (ticket {})", seq);
            return None;
        }
        self.scanning = false;
        self.elapsed_millis = Some(result.elapsed_millis);
        Some(result)
    }

    /// A failed completion clears the indicator only when it belongs to the
    /// latest scan; the previously installed tree stays intact either way.
    pub fn fail(&mut self, seq: u64) -> bool {
        if self.latest_seq != Some(seq) {
            debug!("discarding stale scan failure (ticket {})", seq);
            return false;
        }
        self.scanning = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FsNode, NodeKind};

    fn result(name: &str, elapsed_millis: u64) -> ScanResult {
        ScanResult {
            root: FsNode {
                id: 0,
                name: name.to_string(),
                kind: NodeKind::Directory,
                size: 0,
                num_files: 0,
                num_dirs: 1,
                children: Some(Vec::new()),
            },
            elapsed_millis,
        }
    }

    #[test]
    fn latest_scan_completes() {
        let mut orch = ScanOrchestrator::new();
        orch.begin(1);
        assert!(orch.is_scanning());

        let applied = orch.complete(1, result("root", 42)).unwrap();
        assert_eq!(applied.elapsed_millis, 42);
        assert!(!orch.is_scanning());
        assert_eq!(orch.elapsed_millis(), Some(42));
    }

    #[test]
    fn stale_scan_is_discarded() {
        let mut orch = ScanOrchestrator::new();
        orch.begin(1);
        orch.begin(2);

        // The newer scan resolves first.
        assert!(orch.complete(2, result("new", 10)).is_some());
        assert!(!orch.is_scanning());

        // The older scan resolving later must not overwrite anything.
        assert!(orch.complete(1, result("old", 99)).is_none());
        assert_eq!(orch.elapsed_millis(), Some(10));
    }

    #[test]
    fn stale_failure_keeps_indicator_for_pending_scan() {
        let mut orch = ScanOrchestrator::new();
        orch.begin(1);
        orch.begin(2);

        // The superseded scan failing must not clear the indicator of the
        // scan still in flight.
        assert!(!orch.fail(1));
        assert!(orch.is_scanning());

        assert!(orch.fail(2));
        assert!(!orch.is_scanning());
    }
}
