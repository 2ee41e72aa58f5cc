//! treescope: lazy-loading disk usage tree explorer.
//!
//! The pipeline: the scanner builds a full tree on the backend side, the
//! store tracks the lazily fetched subset plus per-node UI state, `flatten`
//! projects the expanded portion into rows, and `window` picks the slice of
//! rows the terminal actually renders.

pub mod backend;
pub mod error;
pub mod flatten;
pub mod format;
pub mod node;
pub mod orchestrator;
pub mod scan_tree;
pub mod scanner;
pub mod service;
pub mod store;
pub mod window;
